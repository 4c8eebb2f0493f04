// small rewrites applied to everything we decode from the api

/// where the proxied images are served from
pub const IMAGE_PROXY_PREFIX: &str = "/_/proxy/images?url=";

// every user without an avatar gets this one, no point in showing (or proxying) it
const DEFAULT_AVATAR_PATH: &str = "/images/default_avatar_large.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkSize {
    /// detail pages
    Large,
    /// lists
    Small,
}

impl ArtworkSize {
    pub fn from_large(large: bool) -> Self {
        if large { Self::Large } else { Self::Small }
    }

    fn token(self) -> &'static str {
        match self {
            Self::Large => "-t500x500.",
            Self::Small => "-t200x200.",
        }
    }
}

/// swaps the `-large.` size token for the requested thumbnail size, only the first one
pub fn resize_artwork(url: &str, size: ArtworkSize) -> String {
    url.replacen("-large.", size.token(), 1)
}

pub fn is_default_avatar(url: &str) -> bool {
    url.ends_with(DEFAULT_AVATAR_PATH)
}

/// whether a profile link is actually an email address, `name@host.tld` with a short
/// lowercase tld
pub fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };

    !local.is_empty()
        && local
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-%._+~#=".contains(&b))
        && host.len() >= 2
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-%._+~=&".contains(&b))
        && (1..=6).contains(&tld.len())
        && tld.bytes().all(|b| b.is_ascii_lowercase())
}

/// wraps an image url into the local image proxy, already wrapped and empty urls are left alone
pub fn proxy_image(url: &str) -> String {
    if url.is_empty() || url.starts_with(IMAGE_PROXY_PREFIX) {
        return url.to_string();
    }

    format!("{}{}", IMAGE_PROXY_PREFIX, urlencoding::encode(url))
}

/// `soundcloud:tracks:12345` -> `12345`, anything without a colon comes back as is
pub fn normalize_urn(urn: &str) -> &str {
    match urn.rsplit_once(':') {
        Some((_, id)) => id,
        None => urn,
    }
}

/// splits a tag list on spaces, double quotes group words into a single tag
///
/// `a "b c" d` -> `["a", "b c", "d"]`
pub fn parse_tag_list(tag_list: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut in_string = false;
    let mut current = String::new();

    for c in tag_list.chars() {
        match c {
            '"' => {
                in_string = !in_string;
                if !in_string && !current.is_empty() {
                    tags.push(std::mem::take(&mut current));
                }
            }
            ' ' if !in_string => {
                if !current.is_empty() {
                    tags.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        tags.push(current);
    }

    tags
}
