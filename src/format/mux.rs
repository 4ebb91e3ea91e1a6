use crate::error::{RemuxError, Result};
use crate::format::m2ts::M2tsFilter;
use crate::format::ps::PsFilter;
use crate::format::stream::{ByteSource, Passthrough};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Output container requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mux {
    /// MPEG-2 program stream, remultiplexed by [`PsFilter`].
    Ps,
    /// MPEG-2 transport stream, forwarded as the encoder wrote it.
    Ts,
    /// BDAV transport stream, repacketized by [`M2tsFilter`].
    M2ts,
}

impl Mux {
    /// The name clients use to request this container.
    pub fn name(self) -> &'static str {
        match self {
            Mux::Ps => "ps",
            Mux::Ts => "ts",
            Mux::M2ts => "m2ts",
        }
    }

    /// The container the encoder has to be asked for.
    pub fn encoder_mux(self) -> &'static str {
        match self {
            Mux::Ps => "ps",
            Mux::Ts | Mux::M2ts => "ts",
        }
    }

    /// MIME type for the HTTP response.
    pub fn content_type(self) -> &'static str {
        match self {
            Mux::Ps => "video/mpeg",
            Mux::Ts => "video/x-mpegts",
            Mux::M2ts => "video/vnd.dlna.mpeg-tts",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Mux::Ps => "mpg",
            Mux::Ts => "ts",
            Mux::M2ts => "m2ts",
        }
    }

    /// Wraps the encoder output in the filter this container needs.
    pub fn open<R: Read + Send + 'static>(self, input: R) -> Box<dyn ByteSource> {
        log::debug!("opening {} output", self);
        match self {
            Mux::Ps => Box::new(PsFilter::new(input)),
            Mux::Ts => Box::new(Passthrough::new(input)),
            Mux::M2ts => Box::new(M2tsFilter::new(input)),
        }
    }
}

impl FromStr for Mux {
    type Err = RemuxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ps" => Ok(Mux::Ps),
            "ts" => Ok(Mux::Ts),
            "m2ts" => Ok(Mux::M2ts),
            _ => Err(RemuxError::UnknownMux(s.to_string())),
        }
    }
}

impl fmt::Display for Mux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
