use thiserror::Error;

/// How an error is surfaced to the user who triggered it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown command, missing or out-of-range argument
    Invocation,
    /// A check failed (voice channel, guild permission, ownership)
    Permission,
    /// The request was understood but the domain refused it
    Domain,
    /// Worth one retry (HTTP 5xx, node not ready)
    Transient,
    /// Logged at error level, the user gets an apology
    Fatal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Discord API error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invocation(String),

    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    Domain(String),

    #[error("{0}")]
    Transient(String),

    #[error("You need to be in a voice channel first")]
    UserNotInVoice,

    #[error("Timed out while connecting to the voice channel")]
    ChannelTimeout,

    #[error("No results found for `{0}`")]
    NoResults(String),

    #[error("Required runtime not found: {0}")]
    DependencyMissing(String),

    #[error("Failed to download audio node: {0}")]
    DownloadFailed(String),

    #[error("Audio node unreachable: {0}")]
    NodeUnreachable(String),

    #[error("Tag `{0}` not found")]
    TagNotFound(String),

    #[error("`{0}` is already taken")]
    TagCollision(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Error::Custom(msg.into())
    }

    pub fn invocation<S: Into<String>>(msg: S) -> Self {
        Error::Invocation(msg.into())
    }

    pub fn permission<S: Into<String>>(msg: S) -> Self {
        Error::Permission(msg.into())
    }

    pub fn domain<S: Into<String>>(msg: S) -> Self {
        Error::Domain(msg.into())
    }

    pub fn transient<S: Into<String>>(msg: S) -> Self {
        Error::Transient(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Invocation(_) => ErrorKind::Invocation,
            Error::Permission(_) | Error::UserNotInVoice => ErrorKind::Permission,
            Error::Domain(_)
            | Error::NoResults(_)
            | Error::TagNotFound(_)
            | Error::TagCollision(_)
            | Error::ChannelTimeout => ErrorKind::Domain,
            Error::Transient(_) => ErrorKind::Transient,
            Error::Http(e) if is_transient_http(e) => ErrorKind::Transient,
            _ => ErrorKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

fn is_transient_http(e: &reqwest::Error) -> bool {
    if e.is_timeout() || e.is_connect() {
        return true;
    }
    e.status().map(|s| s.is_server_error()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::invocation("x").kind(), ErrorKind::Invocation);
        assert_eq!(Error::UserNotInVoice.kind(), ErrorKind::Permission);
        assert_eq!(Error::NoResults("q".into()).kind(), ErrorKind::Domain);
        assert_eq!(Error::TagCollision("hi".into()).kind(), ErrorKind::Domain);
        assert_eq!(Error::NodeUnreachable("down".into()).kind(), ErrorKind::Fatal);
        assert!(Error::transient("502").is_transient());
        assert!(!Error::custom("boom").is_transient());
    }
}
