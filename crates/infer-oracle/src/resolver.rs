//! Early termination from cached prefix knowledge.
//!
//! Once a cached response shows the server closed the connection, every
//! extension of that query is answered without network I/O. Otherwise the
//! cached response still tells the mapper how many fields to expect at each
//! known position and where no reply will come.

use infer_core::{KnowledgeBase, Letter, ResponseHints, Word};

/// Canonical marker symbols of the mapper's response alphabet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// Last field of a response meaning the server closed the connection.
    pub connection_closed: String,
    /// Letter padded onto answers past a closed connection.
    pub closed_letter: String,
    /// Canonical symbol of a request that gets no reply.
    pub no_response: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            connection_closed: "Eof".into(),
            closed_letter: "Eof,".into(),
            no_response: "No resp,".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Answer fully determined by a closed-connection prefix.
    Closed(Word),
    /// Query must go over the network; hints come from the longest cached
    /// prefix.
    Hinted(ResponseHints),
    /// No proper prefix is cached.
    Unknown,
}

/// Look up the longest cached proper prefix of `query`.
pub fn resolve<K>(knowledge: &K, query: &Word, markers: &Markers) -> Resolution
where
    K: KnowledgeBase + ?Sized,
{
    for len in (1..query.len()).rev() {
        let prefix = query.prefix(len);
        if let Some(response) = knowledge.output_word(&prefix) {
            return classify(response, query.len(), markers);
        }
    }
    Resolution::Unknown
}

fn classify(response: &Word, query_len: usize, markers: &Markers) -> Resolution {
    let closed = response
        .last()
        .is_some_and(|letter| letter.last_field() == markers.connection_closed);
    if closed {
        let mut answer = response.clone();
        answer.pad_to(query_len, &Letter::new(markers.closed_letter.as_str()));
        return Resolution::Closed(answer);
    }

    let field_counts = response.letters().iter().map(Letter::field_count).collect();
    let no_response = response
        .letters()
        .iter()
        .enumerate()
        .filter(|(_, letter)| letter.is(&markers.no_response))
        .map(|(index, _)| index)
        .collect();
    Resolution::Hinted(ResponseHints {
        field_counts,
        no_response,
    })
}
