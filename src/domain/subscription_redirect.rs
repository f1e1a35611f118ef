/// Outcome codes the subscription status page understands.
///
/// They travel in the `code` query parameter of a redirect and are unrelated to the
/// HTTP status of the redirect itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectCode {
    Verified,
    AlreadyVerified,
    Unauthorized,
    NotFound,
    Internal,
}

impl RedirectCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectCode::Verified => "200",
            RedirectCode::AlreadyVerified => "201",
            RedirectCode::Unauthorized => "401",
            RedirectCode::NotFound => "404",
            RedirectCode::Internal => "500",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionRedirect {
    code: RedirectCode,
    email: Option<String>,
    token: Option<String>,
    error: Option<&'static str>,
    missing_vars: Vec<&'static str>,
}

impl SubscriptionRedirect {
    pub fn new(code: RedirectCode) -> Self {
        Self {
            code,
            email: None,
            token: None,
            error: None,
            missing_vars: Vec::new(),
        }
    }

    pub fn email(mut self, email: Option<impl Into<String>>) -> Self {
        self.email = email.map(Into::into);
        self
    }

    pub fn token(mut self, token: Option<impl Into<String>>) -> Self {
        self.token = token.map(Into::into);
        self
    }

    pub fn error(mut self, error: &'static str) -> Self {
        self.error = Some(error);
        self
    }

    pub fn missing_vars(mut self, missing_vars: Vec<&'static str>) -> Self {
        self.missing_vars = missing_vars;
        self
    }

    pub fn code(&self) -> RedirectCode {
        self.code
    }

    /// Builds `https://{root_domain}/subscription?code=..`, leaving out absent values.
    pub fn location(&self, root_domain: &str) -> String {
        let mut location = format!(
            "https://{}/subscription?code={}",
            root_domain,
            self.code.as_str()
        );

        if let Some(email) = &self.email {
            location.push_str(&format!("&email={}", urlencoding::encode(email)));
        }
        if let Some(token) = &self.token {
            location.push_str(&format!("&token={}", urlencoding::encode(token)));
        }
        if let Some(error) = self.error {
            location.push_str(&format!("&error={}", urlencoding::encode(error)));
        }
        if !self.missing_vars.is_empty() {
            location.push_str(&format!(
                "&missingVars={}",
                urlencoding::encode(&self.missing_vars.join(","))
            ));
        }

        location
    }
}
