mod file;
pub use file::RotatingFileSink;

mod stdout;
pub use stdout::StdoutSink;

use tcpw_model::CaptureRecord;

use crate::error::ExecError;

/// One JSON object per line.
pub(crate) fn json_line(record: &CaptureRecord) -> Result<Vec<u8>, ExecError> {
    let mut line = serde_json::to_vec(record).map_err(|e| ExecError::Sink(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}
