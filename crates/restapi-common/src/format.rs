use std::fmt;

/// Response representation requested by a client.
///
/// Pretty variants only change how the backend lays out its own output;
/// the envelope built around it is the same as for the dense variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
    JsonPretty,
    Xml,
    XmlPretty,
}

impl OutputFormat {
    /// Formats that may be requested explicitly (path suffix or `format=`).
    pub const EXPLICIT: [OutputFormat; 4] = [
        OutputFormat::Json,
        OutputFormat::JsonPretty,
        OutputFormat::Xml,
        OutputFormat::XmlPretty,
    ];

    /// Parse an explicit format name. `plain` is accepted for symmetry.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plain" => Some(Self::Plain),
            "json" => Some(Self::Json),
            "json-pretty" => Some(Self::JsonPretty),
            "xml" => Some(Self::Xml),
            "xml-pretty" => Some(Self::XmlPretty),
            _ => None,
        }
    }

    /// Name passed to the backend in the `format` argument.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
            Self::Xml => "xml",
            Self::XmlPretty => "xml-pretty",
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty)
    }

    pub fn is_xml(&self) -> bool {
        matches!(self, Self::Xml | Self::XmlPretty)
    }

    /// HTTP `Content-Type` for a response in this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Plain => "text/plain",
            Self::Json | Self::JsonPretty => "application/json",
            Self::Xml | Self::XmlPretty => "application/xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
