//! Bearer-token providers.

use std::future::Future;

use async_trait::async_trait;

/// Supplies the bearer token for authenticated calls.
///
/// `None` or an empty string makes authenticated calls fail with an `Auth`
/// error before anything is sent.
#[async_trait]
pub trait TokenProvider: Send + Sync {
  async fn access_token(&self) -> Option<String>;
}

/// Provider for services that never authenticate.
pub struct NoToken;

#[async_trait]
impl TokenProvider for NoToken {
  async fn access_token(&self) -> Option<String> {
    None
  }
}

/// Fixed token.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
  async fn access_token(&self) -> Option<String> {
    Some(self.0.clone())
  }
}

/// Reads the token from the first set environment variable, on every call.
pub struct EnvToken {
  vars: Vec<String>,
}

impl EnvToken {
  pub fn new<I, S>(vars: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      vars: vars.into_iter().map(Into::into).collect(),
    }
  }
}

#[async_trait]
impl TokenProvider for EnvToken {
  async fn access_token(&self) -> Option<String> {
    self.vars.iter().find_map(|var| std::env::var(var).ok())
  }
}

/// Adapts an async closure, e.g. one that refreshes an OAuth session.
pub struct FnToken<F>(pub F);

#[async_trait]
impl<F, Fut> TokenProvider for FnToken<F>
where
  F: Fn() -> Fut + Send + Sync,
  Fut: Future<Output = Option<String>> + Send,
{
  async fn access_token(&self) -> Option<String> {
    (self.0)().await
  }
}
