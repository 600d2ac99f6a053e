use url::Url;

/// Resolves `href` against `base` into an absolute, fragment-free http(s) URL.
///
/// Returns `None` for empty hrefs, `javascript:` pseudo-links, unparseable
/// references and any non-http(s) scheme (`mailto:`, `tel:`, `data:`, ...).
pub fn normalize(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href
        .get(..11)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("javascript:"))
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// Scheme, host and effective port of a URL. Two URLs are on the same site
/// when their authorities compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Authority {
    pub fn of(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        Some(Self {
            scheme: url.scheme().to_owned(),
            host,
            port: url.port_or_known_default(),
        })
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Url::parse(raw).ok().as_ref().and_then(Self::of)
    }

    pub fn contains(&self, url: &Url) -> bool {
        Self::of(url).is_some_and(|other| other == *self)
    }

    pub fn contains_str(&self, raw: &str) -> bool {
        Url::parse(raw).is_ok_and(|url| self.contains(&url))
    }
}

/// Key used for visited-set bookkeeping: the URL without fragment and
/// without trailing path slashes.
pub fn dedup_key(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);
    let mut path = canonical.path().to_owned();
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    canonical.set_path(&path);

    let mut key = canonical.to_string();
    if canonical.path() == "/" && canonical.query().is_none() {
        key.pop();
    }
    key
}
