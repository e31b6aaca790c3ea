//! Subject naming (spec §4.2, §6): strict `"<domain>.<version>.<server-id>.<entity-id>"`
//! shape, shaped identically across all three domains. Update and removal
//! frames for the same entity share a single subject -- a removal frame
//! carries only the id, so the payload itself tells a subscriber which kind
//! it received, rather than an extra subject segment.

use model::ids::{DispatchPostId, JourneyId, ServerId};

/// The server domain has no entity distinct from the server itself, so the
/// entity-id slot repeats the server-id to keep all three domains shaped
/// the same.
pub fn server_subject(server_id: ServerId) -> String {
    format!("server.v1.{0}.{0}", server_id.raw())
}

pub fn journey_subject(server_id: ServerId, journey_id: JourneyId) -> String {
    format!("journey.v1.{}.{}", server_id.raw(), journey_id.raw())
}

pub fn dispatch_post_subject(server_id: ServerId, post_id: DispatchPostId) -> String {
    format!("dispatchpost.v1.{}.{}", server_id.raw(), post_id.raw())
}

/// Everything for one domain (spec §4.2 "wildcards on the last two levels").
pub fn domain_wildcard(domain: &str) -> String {
    format!("{domain}.v1.>")
}

/// Everything for one domain scoped to one server.
pub fn server_scoped_wildcard(domain: &str, server_id: ServerId) -> String {
    format!("{domain}.v1.{}.>", server_id.raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::ids::{dispatch_post_id, journey_id, server_id};

    #[test]
    fn subjects_are_four_tokens_for_every_domain() {
        let server = server_id("en1", "abc");
        let journey = journey_id(server, "run-1");
        let post = dispatch_post_id("en1", "post-1");

        for subject in [
            server_subject(server),
            journey_subject(server, journey),
            dispatch_post_subject(server, post),
        ] {
            assert_eq!(subject.split('.').count(), 4);
        }
    }

    #[test]
    fn server_scoped_wildcard_matches_subject_prefix() {
        let server = server_id("en1", "abc");
        let journey = journey_id(server, "run-1");
        let subject = journey_subject(server, journey);
        let wildcard_prefix = server_scoped_wildcard("journey", server).trim_end_matches('>').to_string();
        assert!(subject.starts_with(&wildcard_prefix));
    }
}
