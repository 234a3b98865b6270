//! tcpdump-backed capture engines and output sinks.

mod error;
pub use error::ExecError;

mod util;
pub use util::find_program;

mod tcpdump;
pub use tcpdump::TcpdumpEngine;

mod decoded;
pub use decoded::{DecodedEngine, parse_line};

mod sink;
pub use sink::{RotatingFileSink, StdoutSink};

mod backend;
pub use backend::TcpdumpBackend;
