use std::{fmt, time::Duration};

use thiserror::Error;

pub type EsiResult<T> = Result<T, EsiError>;

#[derive(Debug, Error)]
pub enum EsiError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("sso operation failed")]
    Rfesi(#[from] rfesi::prelude::EsiError),
    #[error("http request failed")]
    Http(#[from] reqwest::Error),
    #[error("invalid url")]
    Url(#[from] url::ParseError),
    #[error("identity store operation failed")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("authorization state is unknown, superseded or already used")]
    InvalidState,
    #[error("provider rejected the authorization code")]
    GrantExchange(#[source] Box<EsiError>),
    #[error("provider rejected the stored credential for {identity}")]
    IdentityUnauthorized {
        identity: String,
        #[source]
        source: Box<EsiError>,
    },
    #[error("asset fetch for {identity} failed")]
    AggregationFatal {
        identity: String,
        #[source]
        source: Box<EsiError>,
    },
    #[error("credential rejected by {endpoint} with status {status}")]
    CredentialRejected { endpoint: String, status: u16 },
    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("missing required scopes: {missing:?}")]
    MissingRequiredScopes { missing: Vec<String> },
    #[error("token claims are missing from the authentication response")]
    MissingClaims,
    #[error("esi did not provide an access token")]
    MissingAccessToken,
    #[error("esi did not provide a refresh token")]
    MissingRefreshToken,
    #[error("invalid token subject format: {0}")]
    InvalidTokenSubject(String),
    #[error("invalid token scope claim format: {0}")]
    InvalidScopeClaim(String),
    #[error("{0}")]
    Message(String),
}

impl EsiError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store(Box::new(err))
    }

    /// True when the provider said the credential itself is no good, as
    /// opposed to a transport or server failure.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::CredentialRejected { .. } => true,
            Self::IdentityUnauthorized { .. } => true,
            _ => false,
        }
    }

    pub fn display_chain(&self) -> DisplayChainedError<'_> {
        DisplayChainedError { inner: self }
    }
}

pub struct DisplayChainedError<'a> {
    inner: &'a (dyn std::error::Error + 'static),
}

impl fmt::Debug for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self.inner);

        while let Some(err) = current {
            if first {
                first = false;
            } else {
                write!(f, " -> ")?;
            }

            write!(f, "{err}")?;
            current = err.source();
        }

        Ok(())
    }
}

impl fmt::Display for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
