use crate::cancel::CancelToken;
use crate::recorder::{RecorderConfig, RecorderStats};
use inputtape_core::{Error, Result};
use std::path::Path;

/// Global input capture is not available on this platform
pub fn record(_path: &Path, _config: RecorderConfig, _token: &CancelToken) -> Result<RecorderStats> {
    Err(Error::not_supported("Recording"))
}

pub fn get_focused_window_title() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use inputtape_core::ErrorCode;

    #[test]
    fn record_fails_without_touching_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.log");
        std::fs::write(&path, "{\"WAITING_TIME\":0}\n").unwrap();

        let err = record(&path, RecorderConfig::default(), &CancelToken::new()).unwrap_err();

        assert_eq!(err.code, ErrorCode::NotSupported);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"WAITING_TIME\":0}\n");
    }
}
