use bmi_tracker::{
    models::{PublicUser, Role},
    session::{DecodeError, EncodeError, Session, SessionClaims, SessionCodec},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use chrono::{DateTime, Duration, Utc};

const SECRET: &[u8] = b"test-secret-that-is-long-enough-for-prod";

fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).unwrap()
}

fn user(role: Role) -> PublicUser {
    PublicUser {
        id: 42,
        username: "alice".to_string(),
        role,
    }
}

#[test]
fn test_round_trip_preserves_session() {
    let codec = SessionCodec::new(SECRET);
    let session = Session::issue(&user(Role::Admin), fixed_now(), Duration::hours(24)).unwrap();

    let token = codec.encode(&session).unwrap();
    let decoded = codec.decode_at(&token, fixed_now()).unwrap();

    assert_eq!(decoded, session);
    assert!(decoded.is_admin());
    assert_eq!(decoded.identity(), user(Role::Admin));
}

#[test]
fn test_issue_truncates_expiry_to_whole_seconds() {
    let now = fixed_now() + Duration::milliseconds(750);
    let session = Session::issue(&user(Role::User), now, Duration::hours(1)).unwrap();

    assert_eq!(session.expires_at.timestamp_subsec_nanos(), 0);
    assert_eq!(session.expires_at, fixed_now() + Duration::hours(1));
}

#[test]
fn test_decode_rejects_expired_token() {
    let codec = SessionCodec::new(SECRET);
    let session = Session::issue(&user(Role::User), fixed_now(), Duration::hours(1)).unwrap();
    let token = codec.encode(&session).unwrap();

    let later = fixed_now() + Duration::hours(2);
    assert!(matches!(
        codec.decode_at(&token, later),
        Err(DecodeError::Expired(at)) if at == session.expires_at
    ));
}

#[test]
fn test_token_is_dead_at_the_exact_expiry_instant() {
    let codec = SessionCodec::new(SECRET);
    let session = Session::issue(&user(Role::User), fixed_now(), Duration::hours(1)).unwrap();
    let token = codec.encode(&session).unwrap();

    assert!(codec.decode_at(&token, session.expires_at - Duration::seconds(1)).is_ok());
    assert!(matches!(
        codec.decode_at(&token, session.expires_at),
        Err(DecodeError::Expired(_))
    ));
}

#[test]
fn test_decode_uses_wall_clock() {
    let codec = SessionCodec::new(SECRET);

    let live = Session::issue(&user(Role::User), Utc::now(), Duration::hours(1)).unwrap();
    assert!(codec.decode(&codec.encode(&live).unwrap()).is_ok());

    let stale = Session::issue(&user(Role::User), Utc::now() - Duration::days(2), Duration::hours(1)).unwrap();
    assert!(codec.decode(&codec.encode(&stale).unwrap()).is_err());
}

#[test]
fn test_decode_rejects_token_signed_with_other_secret() {
    let issuer = SessionCodec::new(b"some-other-secret-entirely-different!!");
    let codec = SessionCodec::new(SECRET);
    let session = Session::issue(&user(Role::Admin), fixed_now(), Duration::hours(1)).unwrap();

    let token = issuer.encode(&session).unwrap();
    assert!(matches!(
        codec.decode_at(&token, fixed_now()),
        Err(DecodeError::Invalid(_))
    ));
}

#[test]
fn test_decode_rejects_tampered_payload() {
    let codec = SessionCodec::new(SECRET);
    let user_token = codec
        .encode(&Session::issue(&user(Role::User), fixed_now(), Duration::hours(1)).unwrap())
        .unwrap();
    let admin_token = codec
        .encode(&Session::issue(&user(Role::Admin), fixed_now(), Duration::hours(1)).unwrap())
        .unwrap();

    // Graft the admin payload onto the user token's signature.
    let user_parts: Vec<&str> = user_token.split('.').collect();
    let admin_parts: Vec<&str> = admin_token.split('.').collect();
    let forged = format!("{}.{}.{}", user_parts[0], admin_parts[1], user_parts[2]);

    assert!(codec.decode_at(&forged, fixed_now()).is_err());
}

#[test]
fn test_decode_rejects_garbage() {
    let codec = SessionCodec::new(SECRET);

    for token in ["", "not-a-token", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.e30."] {
        assert!(
            matches!(codec.decode_at(token, fixed_now()), Err(DecodeError::Invalid(_))),
            "{token:?} should be invalid"
        );
    }
}

#[test]
fn test_issue_rejects_lifetimes_without_a_future_expiry() {
    let alice = user(Role::User);

    assert!(matches!(
        Session::issue(&alice, fixed_now(), Duration::MAX),
        Err(EncodeError::Lifetime(_))
    ));
    assert!(matches!(
        Session::issue(&alice, fixed_now(), Duration::zero()),
        Err(EncodeError::Lifetime(_))
    ));
    assert!(matches!(
        Session::issue(&alice, fixed_now(), Duration::hours(-1)),
        Err(EncodeError::Lifetime(_))
    ));
}

#[test]
fn test_decode_treats_out_of_range_expiry_as_invalid() {
    let codec = SessionCodec::new(SECRET);
    let claims = SessionClaims {
        uid: 42,
        username: "alice".to_string(),
        role: Role::User,
        exp: i64::MAX,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();

    assert!(matches!(
        codec.decode_at(&token, fixed_now()),
        Err(DecodeError::Invalid(_))
    ));
}
