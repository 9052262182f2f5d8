use std::path::Path;

use snafu::ResultExt;

use crate::{error::*, layout::page::PageResult};

/// Writes the results as pretty printed JSON.
pub fn write_json(results: &[PageResult], path: &Path) -> Result<(), HtrError> {
    let json = serde_json::to_string_pretty(results).context(JsonSnafu {
        stage: "serialize-results",
    })?;
    std::fs::write(path, json).context(IoWriteSnafu {
        path: path.to_string_lossy(),
    })
}
