// ABOUTME: Engine socket detection on the local host.
// ABOUTME: Checks Podman sockets first, then Docker, unless configured explicitly.

use super::types::{RuntimeConfig, RuntimeInfo, RuntimeType};
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,
}

/// Detect the container engine on this host.
///
/// Detection order:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_local() -> Result<RuntimeInfo, DetectionError> {
    candidate_sockets()
        .into_iter()
        .find(|info| Path::new(&info.socket_path).exists())
        .ok_or(DetectionError::NoRuntimeFound)
}

/// Use the configured runtime if one is named, otherwise probe local sockets.
pub fn resolve_runtime(config: Option<&RuntimeConfig>) -> Result<RuntimeInfo, DetectionError> {
    if let Some(cfg) = config {
        if let Some(runtime_type) = cfg.runtime {
            let socket_path = cfg
                .socket
                .clone()
                .unwrap_or_else(|| default_socket_path(runtime_type).to_string());
            return Ok(RuntimeInfo {
                runtime_type,
                socket_path,
            });
        }
        // A bare socket path is assumed to speak the Docker-compatible API.
        if let Some(socket) = &cfg.socket {
            return Ok(RuntimeInfo {
                runtime_type: RuntimeType::Docker,
                socket_path: socket.clone(),
            });
        }
    }

    detect_local()
}

fn candidate_sockets() -> Vec<RuntimeInfo> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(uid) = get_uid() {
        candidates.push(RuntimeInfo {
            runtime_type: RuntimeType::Podman,
            socket_path: format!("/run/user/{}/podman/podman.sock", uid),
        });
    }
    candidates.push(RuntimeInfo {
        runtime_type: RuntimeType::Podman,
        socket_path: ROOTFUL_PODMAN.to_string(),
    });
    candidates.push(RuntimeInfo {
        runtime_type: RuntimeType::Docker,
        socket_path: DOCKER_SOCKET.to_string(),
    });
    candidates
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

fn default_socket_path(runtime: RuntimeType) -> &'static str {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET,
        RuntimeType::Podman => ROOTFUL_PODMAN,
    }
}
