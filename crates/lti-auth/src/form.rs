//! `application/x-www-form-urlencoded` bodies.

use lti_api::LaunchRequest;
use percent_encoding::percent_decode_str;

use crate::LaunchError;
use crate::oauth::percent_encode;

/// Content type of a launch form submission.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Decode a form body into name/value pairs, keeping order and repeats.
///
/// Stricter than a browser: a stray `%` or an escape that decodes to invalid
/// UTF-8 rejects the whole body.
pub fn parse_form_body(body: &str) -> Result<Vec<(String, String)>, LaunchError> {
    check_encoded(body)?;
    Ok(form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

/// Build a [`LaunchRequest`] from the raw pieces a transport hands over.
pub fn parse_form_request(method: &str, url: &str, body: &str) -> Result<LaunchRequest, LaunchError> {
    let mut request = LaunchRequest::new(method, url).with_content_type(FORM_CONTENT_TYPE);
    request.params = parse_form_body(body)?;
    Ok(request)
}

/// Encode name/value pairs as a form body. Uses RFC 3986 escaping, which every
/// form decoder accepts.
pub fn encode_form_body(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Every `%` starts a two-digit hex escape and the decoded bytes are UTF-8.
pub(crate) fn check_encoded(raw: &str) -> Result<(), LaunchError> {
    let bytes = raw.as_bytes();
    for (i, _) in raw.match_indices('%') {
        let escape = bytes.get(i + 1..i + 3).unwrap_or_default();
        if escape.len() != 2 || !escape.iter().all(u8::is_ascii_hexdigit) {
            return Err(LaunchError::malformed(format!(
                "invalid percent escape in {raw:?}"
            )));
        }
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| LaunchError::malformed(format!("form data {raw:?} is not UTF-8")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plus_and_escapes() {
        let params = parse_form_body("lis_person_name_full=Jane+Doe&email=jane%40example.com&flag")
            .unwrap();
        assert_eq!(
            params,
            vec![
                ("lis_person_name_full".to_string(), "Jane Doe".to_string()),
                ("email".to_string(), "jane@example.com".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn skips_empty_segments() {
        let params = parse_form_body("&a=1&&b=2&").unwrap();
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn rejects_bad_escapes_and_non_utf8() {
        assert!(matches!(
            parse_form_body("a=%zz"),
            Err(LaunchError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_form_body("a=%4"),
            Err(LaunchError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_form_body("a=%ff%fe"),
            Err(LaunchError::MalformedRequest(_))
        ));
    }

    #[test]
    fn encoded_body_parses_back() {
        let params = vec![
            ("name".to_string(), "José Ñúñez & co".to_string()),
            ("roles".to_string(), "Instructor,Learner".to_string()),
        ];
        let body = encode_form_body(&params);
        assert!(!body.contains(' '));
        assert_eq!(parse_form_body(&body).unwrap(), params);
    }

    #[test]
    fn request_carries_form_content_type() {
        let req = parse_form_request("POST", "https://tool.example/lti/launch", "a=1").unwrap();
        assert_eq!(req.content_type.as_deref(), Some(FORM_CONTENT_TYPE));
        assert_eq!(req.param("a"), Some("1"));
    }
}
