//! Identity claim extraction from launch parameters.

use lti_api::{ClaimField, IdentityClaims, LaunchRequest};

/// Read the fixed claim set from a launch. Every field is resolved on its own:
/// a missing or empty parameter leaves only that field absent.
pub fn extract_claims(request: &LaunchRequest) -> IdentityClaims {
    IdentityClaims {
        user_id: text(request, ClaimField::UserId),
        given_name: text(request, ClaimField::GivenName),
        family_name: text(request, ClaimField::FamilyName),
        full_name: text(request, ClaimField::FullName),
        email: text(request, ClaimField::Email),
        roles: text(request, ClaimField::Roles),
        context_id: text(request, ClaimField::ContextId),
        context_title: text(request, ClaimField::ContextTitle),
        context_label: text(request, ClaimField::ContextLabel),
    }
}

fn text(request: &LaunchRequest, field: ClaimField) -> Option<String> {
    request
        .param(field.param_name())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lti_api::NOT_AVAILABLE;

    fn full_launch() -> LaunchRequest {
        LaunchRequest::new("POST", "https://tool.example/lti/launch")
            .with_param("user_id", "42")
            .with_param("lis_person_name_given", "Jane")
            .with_param("lis_person_name_family", "Doe")
            .with_param("lis_person_name_full", "Jane Doe")
            .with_param("lis_person_contact_email_primary", "jane@example.edu")
            .with_param("roles", "Instructor, urn:lti:role:ims/lis/TeachingAssistant")
            .with_param("context_id", "CS101")
            .with_param("context_title", "Intro to CS")
            .with_param("context_label", "CS-101")
    }

    #[test]
    fn reads_every_field() {
        let claims = extract_claims(&full_launch());
        assert_eq!(claims.user_id.as_deref(), Some("42"));
        assert_eq!(claims.given_name.as_deref(), Some("Jane"));
        assert_eq!(claims.family_name.as_deref(), Some("Doe"));
        assert_eq!(claims.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(claims.email.as_deref(), Some("jane@example.edu"));
        assert_eq!(
            claims.roles.as_deref(),
            Some("Instructor, urn:lti:role:ims/lis/TeachingAssistant")
        );
        assert_eq!(
            claims.display(ClaimField::Roles),
            "Instructor, urn:lti:role:ims/lis/TeachingAssistant"
        );
        assert_eq!(
            claims.roles(),
            vec!["Instructor", "urn:lti:role:ims/lis/TeachingAssistant"]
        );
        assert_eq!(claims.context_id.as_deref(), Some("CS101"));
        assert_eq!(claims.context_title.as_deref(), Some("Intro to CS"));
        assert_eq!(claims.context_label.as_deref(), Some("CS-101"));
    }

    #[test]
    fn removing_one_field_only_changes_that_field() {
        let full = extract_claims(&full_launch());
        for field in ClaimField::ALL {
            let mut request = full_launch();
            request.remove_param(field.param_name());
            let partial = extract_claims(&request);

            for other in ClaimField::ALL {
                if other == field {
                    assert_eq!(partial.value(other), None, "{other:?} should be absent");
                    assert_eq!(partial.display(other), NOT_AVAILABLE);
                } else {
                    assert_eq!(partial.value(other), full.value(other), "{other:?} changed");
                }
            }
        }
    }

    #[test]
    fn only_empty_values_count_as_absent() {
        let request = LaunchRequest::new("POST", "https://tool.example/lti/launch")
            .with_param("lis_person_contact_email_primary", "")
            .with_param("context_title", "   ")
            .with_param("roles", " , ");
        let claims = extract_claims(&request);
        assert_eq!(claims.email, None);
        assert_eq!(claims.display(ClaimField::Email), NOT_AVAILABLE);
        assert_eq!(claims.context_title.as_deref(), Some("   "));
        assert_eq!(claims.roles.as_deref(), Some(" , "));
        assert!(claims.roles().is_empty());
    }

    #[test]
    fn empty_launch_yields_all_sentinels() {
        let claims = extract_claims(&LaunchRequest::new("POST", "https://tool.example/"));
        for field in ClaimField::ALL {
            assert_eq!(claims.display(field), NOT_AVAILABLE);
        }
    }
}
