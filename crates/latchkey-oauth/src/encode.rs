//! Percent-encoding and parameter normalization (RFC 5849 Section 3.6, 3.4.1.3.2).
//!
//! OAuth uses its own encoding rules: only `A-Z a-z 0-9 - . _ ~` pass through,
//! everything else is percent-encoded byte-wise with uppercase hex. This differs
//! from HTML form encoding, which turns space into `+`.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// OAuth unreserved characters: A-Z a-z 0-9 - . _ ~
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a string per RFC 3986 unreserved-character rules.
pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Re-encode one raw form component with OAuth rules, byte for byte.
///
/// Bytes that are not valid UTF-8 keep their original `%XX` form.
pub fn reencode_component(raw: &str) -> String {
    let plus_as_space = raw.replace('+', " ");
    let bytes: Vec<u8> = percent_decode_str(&plus_as_space).collect();
    percent_encoding::percent_encode(&bytes, OAUTH_ENCODE_SET).to_string()
}

/// Decode one `application/x-www-form-urlencoded` component (`+` is a space).
pub fn form_decode(value: &str) -> String {
    let plus_as_space = value.replace('+', " ");
    percent_decode_str(&plus_as_space)
        .decode_utf8_lossy()
        .into_owned()
}

/// Normalize parameters into the string that goes into the signature base string.
///
/// Keys and values are encoded first, then pairs are sorted by encoded key and,
/// for equal keys, by encoded value. Duplicate keys are kept.
pub fn normalize_parameters(params: &[(String, String)]) -> String {
    normalize_encoded(
        params
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect(),
    )
}

/// Sort and join pairs that are already OAuth-encoded.
pub fn normalize_encoded(mut encoded: Vec<(String, String)>) -> String {
    encoded.sort();

    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse a form-encoded string (query string or body) into ordered pairs.
///
/// A key without `=` gets an empty value; empty segments are skipped.
pub fn parse_form(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (form_decode(key), form_decode(value))
        })
        .collect()
}

/// Split a raw query string or body into OAuth-encoded pairs without decoding to text.
pub fn parse_form_encoded(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (reencode_component(key), reencode_component(value))
        })
        .collect()
}

/// Render pairs as `k=v&k=v` using OAuth percent-encoding, preserving order.
pub fn encode_form(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Append parameters to a URL's query string, ahead of any fragment.
pub fn append_query(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_owned();
    }
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let separator = match base.split_once('?') {
        Some((_, "")) => "",
        Some(_) => "&",
        None => "?",
    };

    let mut appended = format!("{base}{separator}{}", encode_form(params));
    if let Some(fragment) = fragment {
        appended.push('#');
        appended.push_str(fragment);
    }
    appended
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_percent_encode_unreserved() {
        let unreserved = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
        assert_eq!(percent_encode(unreserved), unreserved);
    }

    #[test]
    fn test_percent_encode_space_is_not_plus() {
        assert_eq!(percent_encode(" "), "%20");
        assert_eq!(percent_encode("a b+c"), "a%20b%2Bc");
    }

    #[test]
    fn test_percent_encode_reserved() {
        assert_eq!(percent_encode("&"), "%26");
        assert_eq!(percent_encode("="), "%3D");
        assert_eq!(percent_encode("/"), "%2F");
        assert_eq!(percent_encode("*"), "%2A");
        assert_eq!(percent_encode("%"), "%25");
    }

    #[test]
    fn test_percent_encode_utf8_uppercase_hex() {
        assert_eq!(percent_encode("\u{2603}"), "%E2%98%83");
        assert_eq!(percent_encode("é"), "%C3%A9");
    }

    #[test]
    fn test_normalize_sorts_by_key_then_value() {
        let params = pairs(&[("b", "2"), ("a", "z"), ("a", "a"), ("c", "")]);
        assert_eq!(normalize_parameters(&params), "a=a&a=z&b=2&c=");
    }

    #[test]
    fn test_normalize_sorts_on_encoded_form() {
        // "c@" encodes to "c%40", which sorts before "c2"
        let params = pairs(&[("c2", ""), ("c@", "")]);
        assert_eq!(normalize_parameters(&params), "c%40=&c2=");
    }

    #[test]
    fn test_normalize_independent_of_input_order() {
        let base = pairs(&[
            ("b5", "=%3D"),
            ("a3", "a"),
            ("c@", ""),
            ("a2", "r b"),
            ("c2", ""),
            ("a3", "2 q"),
        ]);
        let expected = normalize_parameters(&base);

        let mut reversed = base.clone();
        reversed.reverse();
        assert_eq!(normalize_parameters(&reversed), expected);

        for shift in 1..base.len() {
            let mut rotated = base.clone();
            rotated.rotate_left(shift);
            assert_eq!(normalize_parameters(&rotated), expected);
        }
    }

    #[test]
    fn test_parse_form_decodes_plus_and_percent() {
        let parsed = parse_form("a3=2+q&b5=%3D%253D&c2&&a2=r%20b");
        assert_eq!(
            parsed,
            pairs(&[("a3", "2 q"), ("b5", "=%3D"), ("c2", ""), ("a2", "r b")])
        );
    }

    #[test]
    fn test_append_query() {
        let params = pairs(&[("oauth_token", "a b")]);
        assert_eq!(
            append_query("https://example.com/authorize", &params),
            "https://example.com/authorize?oauth_token=a%20b"
        );
        assert_eq!(
            append_query("https://example.com/authorize?x=1", &params),
            "https://example.com/authorize?x=1&oauth_token=a%20b"
        );
        assert_eq!(append_query("https://example.com/", &[]), "https://example.com/");
    }

    #[test]
    fn test_append_query_before_fragment() {
        let params = pairs(&[("oauth_token", "t")]);
        assert_eq!(
            append_query("https://x.example/api#top", &params),
            "https://x.example/api?oauth_token=t#top"
        );
        assert_eq!(
            append_query("https://x.example/api?a=1#top", &params),
            "https://x.example/api?a=1&oauth_token=t#top"
        );
        assert_eq!(
            append_query("https://x.example/api?", &params),
            "https://x.example/api?oauth_token=t"
        );
    }

    #[test]
    fn test_reencode_keeps_raw_bytes() {
        assert_eq!(reencode_component("%FF"), "%FF");
        assert_eq!(reencode_component("%ff%fe"), "%FF%FE");
        assert_eq!(reencode_component("a+b%2Bc"), "a%20b%2Bc");
        assert_eq!(reencode_component("%C3%A9~"), "%C3%A9~");
        assert_eq!(reencode_component("c@"), "c%40");
    }

    #[test]
    fn test_parse_form_encoded() {
        assert_eq!(
            parse_form_encoded("x=%FF&c2&&b5=%3D%253D"),
            pairs(&[("x", "%FF"), ("c2", ""), ("b5", "%3D%253D")])
        );
    }
}
