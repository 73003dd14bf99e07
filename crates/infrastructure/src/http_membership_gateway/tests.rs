use warden_domain::{Capability, MembershipId};

use super::{RolePayload, capabilities_from_bits, parse_permission_bits, rank_table};

fn role(id: &str, position: i64, permissions: &str) -> RolePayload {
    RolePayload {
        id: id.to_owned(),
        position,
        permissions: permissions.to_owned(),
    }
}

#[test]
fn permission_bits_map_to_capabilities() {
    assert_eq!(capabilities_from_bits(0), Vec::<Capability>::new());
    assert_eq!(capabilities_from_bits(8), vec![Capability::Administrator]);
    assert_eq!(
        capabilities_from_bits(268_435_456),
        vec![Capability::ManageMemberships]
    );
    assert_eq!(
        capabilities_from_bits(268_435_456 | 8 | 1024),
        vec![Capability::Administrator, Capability::ManageMemberships]
    );
}

#[test]
fn permission_strings_are_parsed_as_decimal_bit_sets() {
    assert!(matches!(parse_permission_bits("268435464"), Ok(268_435_464)));
    assert!(matches!(parse_permission_bits(""), Ok(0)));
    assert!(parse_permission_bits("0x8").is_err());
}

#[test]
fn role_positions_become_hierarchy_ranks() {
    let ranks = rank_table(vec![role("100", 0, "0"), role("200", 7, "8"), role("300", 3, "")]);
    let Ok(ranks) = ranks else {
        panic!("role listing should convert");
    };

    let Ok(admin) = MembershipId::new("200") else {
        panic!("membership id should be valid");
    };
    let Ok(member) = MembershipId::new("300") else {
        panic!("membership id should be valid");
    };
    assert_eq!(ranks.rank_of(&admin), Some(7));
    assert!(ranks.outranks(&[admin], &[member]));
}

#[test]
fn member_payload_tolerates_missing_roles() {
    let member = serde_json::from_str::<super::MemberPayload>(r#"{"user":{"id":"1"}}"#);
    assert!(matches!(member, Ok(payload) if payload.roles.is_empty()));
}
