//! Offloads encode/decode to tokio's blocking pool.

use std::sync::Arc;

use tessera_core::{Envelope, TesseraError, TransportError, TypeRegistry};

async fn run<T, F>(job: F) -> Result<T, TesseraError>
where
    F: FnOnce() -> Result<T, TesseraError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| TransportError::Worker(e.to_string()))?
}

/// Encode an envelope's payload off the I/O task.
pub(crate) async fn encode(
    registry: Arc<TypeRegistry>,
    envelope: Envelope,
) -> Result<Vec<u8>, TesseraError> {
    run(move || envelope.into_bytes(&registry)).await
}

/// Decode a raw envelope off the I/O task.
pub(crate) async fn decode(
    registry: Arc<TypeRegistry>,
    mut envelope: Envelope,
) -> Result<Envelope, TesseraError> {
    run(move || {
        envelope.decode(&registry)?;
        Ok(envelope)
    })
    .await
}
