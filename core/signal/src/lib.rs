// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

/// Resolves once the process receives a termination request.
pub async fn shutdown() {
    imp::shutdown().await
}

#[cfg(unix)]
mod imp {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::{error, info};

    pub(super) async fn shutdown() {
        tokio::select! {
            // interrupt from the terminal
            _ = sig(SignalKind::interrupt(), "SIGINT") => {}
            // e.g. sent by a container runtime on stop
            _ = sig(SignalKind::terminate(), "SIGTERM") => {}
        };
    }

    async fn sig(kind: SignalKind, name: &str) {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
                info!(
                    target: "landing::signal",
                    "received signal {}, starting shutdown",
                    name,
                );
            }
            Err(e) => {
                error!(target: "landing::signal", error = %e, "cannot register {} handler", name);
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use tracing::{error, info};

    pub(super) async fn shutdown() {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(
                target: "landing::signal",
                "received signal Ctrl-C, starting shutdown",
            ),
            Err(e) => {
                error!(target: "landing::signal", error = %e, "cannot register Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        }
    }
}
