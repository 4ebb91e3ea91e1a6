//! Output containers and the byte-pull plumbing shared by them.

/// BDAV transport stream repacketizer
pub mod m2ts;

/// Output container selection
pub mod mux;

/// Program stream remultiplexer
pub mod ps;

/// Pull-based byte sources and their async adapter
pub mod stream;

pub use self::m2ts::M2tsFilter;
pub use self::mux::Mux;
pub use self::ps::{PsFilter, PsFilterStats};
pub use self::stream::{ByteSource, FilterStream, Passthrough, SourceReader};
