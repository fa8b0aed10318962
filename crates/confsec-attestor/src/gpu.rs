//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! GPU admin queries and GPU/switch attestation token collection. Isolated
//! behind a trait the same way TPM access is in `confsec_core::tpm`, so the
//! boot sequence can run against a simulated GPU under test.

use sha2::{Digest, Sha256};

use crate::error::AttestorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuState {
    pub persistence_mode_on: bool,
    pub ready_state_off: bool,
}

impl GpuState {
    pub fn valid_for_confidential_compute(&self) -> bool {
        self.persistence_mode_on && self.ready_state_off
    }
}

pub trait GpuAttestor: Send + Sync {
    fn query_state(&self) -> Result<GpuState, AttestorError>;
    fn enable_ready_state(&mut self) -> Result<(), AttestorError>;
    fn gpu_attestation_token(&self, nonce: &[u8]) -> Result<Vec<u8>, AttestorError>;
    fn switch_attestation_token(&self, nonce: &[u8]) -> Result<Vec<u8>, AttestorError>;
    fn gpu_intermediate_certs(&self) -> Result<Vec<u8>, AttestorError>;
    fn switch_intermediate_certs(&self) -> Result<Vec<u8>, AttestorError>;
}

/// Deterministic, hash-derived tokens standing in for the NVIDIA attestation
/// API during development and tests. Real deployments query the driver's
/// attestation endpoint instead; this path never ships with `gpu_simulate`
/// disabled.
pub struct SimulatedGpu {
    ready_state_enabled: bool,
}

impl SimulatedGpu {
    pub fn new() -> Self {
        Self {
            ready_state_enabled: false,
        }
    }

    fn derive(label: &str, nonce: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        hasher.update(nonce);
        hasher.finalize().to_vec()
    }
}

impl Default for SimulatedGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuAttestor for SimulatedGpu {
    fn query_state(&self) -> Result<GpuState, AttestorError> {
        Ok(GpuState {
            persistence_mode_on: true,
            ready_state_off: !self.ready_state_enabled,
        })
    }

    fn enable_ready_state(&mut self) -> Result<(), AttestorError> {
        self.ready_state_enabled = true;
        Ok(())
    }

    fn gpu_attestation_token(&self, nonce: &[u8]) -> Result<Vec<u8>, AttestorError> {
        Ok(Self::derive("confsec-simulated-gpu-token", nonce))
    }

    fn switch_attestation_token(&self, nonce: &[u8]) -> Result<Vec<u8>, AttestorError> {
        Ok(Self::derive("confsec-simulated-switch-token", nonce))
    }

    fn gpu_intermediate_certs(&self) -> Result<Vec<u8>, AttestorError> {
        Ok(Self::derive("confsec-simulated-gpu-intermediate", b""))
    }

    fn switch_intermediate_certs(&self) -> Result<Vec<u8>, AttestorError> {
        Ok(Self::derive("confsec-simulated-switch-intermediate", b""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_state_is_off_until_enabled() {
        let mut gpu = SimulatedGpu::new();
        let before = gpu.query_state().unwrap();
        assert!(before.valid_for_confidential_compute());

        gpu.enable_ready_state().unwrap();
        let after = gpu.query_state().unwrap();
        assert!(!after.ready_state_off);
        assert!(!after.valid_for_confidential_compute());
    }

    #[test]
    fn tokens_are_nonce_dependent() {
        let gpu = SimulatedGpu::new();
        let a = gpu.gpu_attestation_token(b"nonce-a").unwrap();
        let b = gpu.gpu_attestation_token(b"nonce-b").unwrap();
        assert_ne!(a, b);
    }
}
