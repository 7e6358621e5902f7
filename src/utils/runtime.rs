use anyhow::Result;

/// The tracker is single threaded: every action and tick runs on one cooperative runtime.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
