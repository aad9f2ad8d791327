// Properties of generated tokens that hold for any well-formed key

use modelrepo_core::{verify_token, ConnectionString, SharedAccessKey, TokenClaims};

const CONNECTION_STRINGS: &[&str] = &[
    "HostName=repo.example.com;RepositoryId=r1;SharedAccessKeyName=owner;SharedAccessKey=c2VjcmV0",
    "HostName=a-b.c-d.io;RepositoryId=Repo_2.x;SharedAccessKeyName=svc@team.io;SharedAccessKey=AAAA",
    "HostName=localhost;RepositoryId=dev;SharedAccessKeyName=k.1;SharedAccessKey=Zm9vYmFyYmF6cXV4",
];

#[test]
fn test_connection_strings_round_trip() {
    for raw in CONNECTION_STRINGS {
        let parsed = ConnectionString::parse(raw).expect("valid connection string");
        let formatted = format!(
            "HostName={};RepositoryId={};SharedAccessKeyName={};SharedAccessKey={}",
            parsed.host_name(),
            parsed.repository_id(),
            parsed.shared_access_key_name().unwrap(),
            parsed.shared_access_key().unwrap()
        );
        assert_eq!(ConnectionString::parse(&formatted).unwrap(), parsed);
    }
}

#[test]
fn test_tokens_within_same_second_agree_and_verify() {
    for raw in CONNECTION_STRINGS {
        let cs = ConnectionString::parse(raw).unwrap();
        let key = SharedAccessKey::from_connection_string(&cs).unwrap();
        let expiry = 1_900_000_000;

        let first = TokenClaims::parse(&key.generate_token_at(expiry).unwrap()).unwrap();
        let second = TokenClaims::parse(&key.generate_token_at(expiry).unwrap()).unwrap();

        assert_eq!(first.audience, second.audience);
        assert_eq!(first.key_name, second.key_name);
        assert_eq!(first.repository_id, second.repository_id);
        assert_eq!(first.signature, second.signature);

        let token = key.generate_token_at(expiry).unwrap();
        assert!(verify_token(&token, &key, expiry - 1).is_ok());
    }
}

#[test]
fn test_fresh_token_verifies_now() {
    let cs = ConnectionString::parse(CONNECTION_STRINGS[0]).unwrap();
    let key = SharedAccessKey::from_connection_string(&cs).unwrap();
    let token = key.generate_token().unwrap();
    let now = chrono::Utc::now().timestamp();
    assert!(verify_token(&token, &key, now).is_ok());
}
