use rss::Channel;
use thiserror::Error;

/// Errors that can occur while decoding an RSS document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The XML itself is malformed
    #[error("XML parse error: {0}")]
    Xml(String),

    /// Well-formed XML, but not an RSS envelope
    #[error("document has no <channel> element")]
    MissingChannel,
}

impl From<rss::Error> for ParseError {
    fn from(err: rss::Error) -> Self {
        match err {
            // Root element is not <rss>/<rdf:RDF>, or no <channel> before the end
            rss::Error::InvalidStartTag | rss::Error::Eof => ParseError::MissingChannel,
            other => ParseError::Xml(other.to_string()),
        }
    }
}

/// A decoded RSS 2.0 document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssFeed {
    pub channel: RssChannel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RawFeedItem>,
}

/// One `<item>` as found in the document. Missing elements are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// `pubDate` text, untouched; see [`crate::feed::dates`]
    pub pub_date: String,
}

/// Decode an RSS 2.0 document.
///
/// Reads the channel's `title`, `link`, `description` and every `<item>`, in
/// document order. Channel title/description and item title/description are then
/// HTML-entity-unescaped (feeds commonly double-escape markup); entities that do
/// not decode are left as written.
pub fn parse_rss(bytes: &[u8]) -> Result<RssFeed, ParseError> {
    // SEC-002: the reader never expands <!ENTITY> declarations
    let channel = Channel::read_from(bytes)?;

    let items = channel
        .items()
        .iter()
        .map(|item| RawFeedItem {
            title: unescape_html(item.title().unwrap_or_default()),
            link: item.link().unwrap_or_default().trim().to_string(),
            description: unescape_html(item.description().unwrap_or_default()),
            pub_date: item.pub_date().unwrap_or_default().trim().to_string(),
        })
        .collect();

    Ok(RssFeed {
        channel: RssChannel {
            title: unescape_html(channel.title()),
            link: channel.link().trim().to_string(),
            description: unescape_html(channel.description()),
            items,
        },
    })
}

fn unescape_html(text: &str) -> String {
    html_escape::decode_html_entities(text.trim()).into_owned()
}
