//! Handler tests over in-memory storage, the plain crypto engine, and
//! the fixed-string token service.

use std::sync::Arc;

use warden_core::Directory;
use warden_crypto::PlainEngine;
use warden_proto::{
    AuthData, Entity, EntityMeta, EntityRequest, Group, GroupRequest, PingRequest, Request,
    SearchRequest, TokenRequest, WireCode,
};
use warden_rpc::RpcServer;
use warden_store::MemoryStore;
use warden_token::{NullTokenService, INVALID_TOKEN, VALID_EMPTY_TOKEN, VALID_TOKEN};

fn new_server() -> RpcServer {
    let dir = Directory::new(Arc::new(MemoryStore::new()), Arc::new(PlainEngine)).unwrap();
    RpcServer::new(Arc::new(dir), Arc::new(NullTokenService))
}

/// Seed the tree the way most handler tests expect it.
fn init_tree(server: &RpcServer) {
    let dir = server.directory();
    dir.new_entity("entity1", -1, "entity1").unwrap();
    dir.new_entity("admin", -1, "admin").unwrap();
    dir.new_group("group1", "The First Group", "", -1).unwrap();
    dir.new_group("group2", "", "", -1).unwrap();
    dir.add_entity_to_group("entity1", "group1").unwrap();
}

fn auth(token: &str) -> Option<AuthData> {
    Some(AuthData {
        token: Some(token.to_string()),
    })
}

fn entity_with_secret(id: &str, secret: &str) -> Option<Entity> {
    let mut e = Entity::with_id(id);
    e.secret = Some(secret.to_string());
    Some(e)
}

#[test]
fn ping_always_answers() {
    let server = new_server();
    let resp = server.handle(Request::Ping(PingRequest::default()));
    assert_eq!(resp.code, WireCode::Ok);
    assert_eq!(resp.msg, "pong");
}

#[test]
fn entity_create_cases() {
    struct Case {
        token: &'static str,
        id: &'static str,
        readonly: bool,
        want: WireCode,
    }
    let cases = [
        Case { token: VALID_TOKEN, id: "test1", readonly: false, want: WireCode::Ok },
        Case { token: VALID_TOKEN, id: "test1", readonly: true, want: WireCode::ReadOnly },
        Case { token: INVALID_TOKEN, id: "test1", readonly: false, want: WireCode::Unauthenticated },
        Case { token: VALID_EMPTY_TOKEN, id: "test1", readonly: false, want: WireCode::RequestorUnqualified },
        Case { token: VALID_TOKEN, id: "entity1", readonly: false, want: WireCode::Exists },
        Case { token: VALID_TOKEN, id: "save-error", readonly: false, want: WireCode::Internal },
    ];

    for (i, case) in cases.iter().enumerate() {
        let server = new_server();
        init_tree(&server);
        server.directory().set_readonly(case.readonly);

        let req = EntityRequest {
            auth: auth(case.token),
            entity: Some(Entity::with_id(case.id)),
            ..EntityRequest::default()
        };
        let resp = server.handle(Request::EntityCreate(req));
        assert_eq!(resp.code, case.want, "case {i}: {}", resp.msg);
    }
}

#[test]
fn entity_create_missing_token() {
    let server = new_server();
    let req = EntityRequest {
        entity: Some(Entity::with_id("test1")),
        ..EntityRequest::default()
    };
    let resp = server.handle(Request::EntityCreate(req));
    assert_eq!(resp.code, WireCode::Unauthenticated);
}

#[test]
fn entity_update_cases() {
    struct Case {
        token: &'static str,
        id: &'static str,
        readonly: bool,
        want: WireCode,
    }
    let cases = [
        Case { token: VALID_TOKEN, id: "entity1", readonly: false, want: WireCode::Ok },
        Case { token: VALID_TOKEN, id: "entity1", readonly: true, want: WireCode::ReadOnly },
        Case { token: INVALID_TOKEN, id: "entity1", readonly: false, want: WireCode::Unauthenticated },
        Case { token: VALID_EMPTY_TOKEN, id: "entity1", readonly: false, want: WireCode::RequestorUnqualified },
        Case { token: VALID_TOKEN, id: "does-not-exist", readonly: false, want: WireCode::DoesNotExist },
    ];

    for (i, case) in cases.iter().enumerate() {
        let server = new_server();
        init_tree(&server);
        server.directory().set_readonly(case.readonly);

        let mut data = Entity::with_id(case.id);
        data.meta = EntityMeta {
            display_name: Some("First Entity".to_string()),
            ..EntityMeta::default()
        };
        let req = EntityRequest {
            auth: auth(case.token),
            data: Some(data),
            ..EntityRequest::default()
        };
        let resp = server.handle(Request::EntityUpdate(req));
        assert_eq!(resp.code, case.want, "case {i}: {}", resp.msg);
    }

    // The successful case really merged.
    let server = new_server();
    init_tree(&server);
    let mut data = Entity::with_id("entity1");
    data.meta.display_name = Some("First Entity".to_string());
    let req = EntityRequest {
        auth: auth(VALID_TOKEN),
        data: Some(data),
        ..EntityRequest::default()
    };
    assert_eq!(server.handle(Request::EntityUpdate(req)).code, WireCode::Ok);
    assert_eq!(
        server
            .directory()
            .get_entity("entity1")
            .unwrap()
            .meta
            .display_name
            .as_deref(),
        Some("First Entity")
    );
}

#[test]
fn entity_destroy_and_locks() {
    let server = new_server();
    init_tree(&server);

    let req = EntityRequest {
        auth: auth(VALID_TOKEN),
        entity: Some(Entity::with_id("entity1")),
        ..EntityRequest::default()
    };
    assert_eq!(
        server.handle(Request::EntityLock(req.clone())).code,
        WireCode::Ok
    );
    assert!(server.directory().get_entity("entity1").unwrap().locked);

    assert_eq!(
        server.handle(Request::EntityUnlock(req.clone())).code,
        WireCode::Ok
    );
    assert!(!server.directory().get_entity("entity1").unwrap().locked);

    assert_eq!(
        server.handle(Request::EntityDestroy(req.clone())).code,
        WireCode::Ok
    );
    // Gone now.
    assert_eq!(
        server.handle(Request::EntityDestroy(req)).code,
        WireCode::DoesNotExist
    );
}

#[test]
fn auth_entity_cases() {
    let server = new_server();
    init_tree(&server);

    let ok = TokenRequest {
        entity: entity_with_secret("entity1", "entity1"),
        ..TokenRequest::default()
    };
    assert_eq!(server.handle(Request::AuthEntity(ok)).code, WireCode::Ok);

    let bad = TokenRequest {
        entity: entity_with_secret("entity1", "wrong"),
        ..TokenRequest::default()
    };
    assert_eq!(
        server.handle(Request::AuthEntity(bad)).code,
        WireCode::Unauthenticated
    );

    let missing = TokenRequest {
        entity: entity_with_secret("nobody", "x"),
        ..TokenRequest::default()
    };
    assert_eq!(
        server.handle(Request::AuthEntity(missing)).code,
        WireCode::DoesNotExist
    );

    // Locked entities cannot authenticate even with the right secret.
    server.directory().lock_entity("entity1").unwrap();
    let locked = TokenRequest {
        entity: entity_with_secret("entity1", "entity1"),
        ..TokenRequest::default()
    };
    assert_eq!(
        server.handle(Request::AuthEntity(locked)).code,
        WireCode::Unauthenticated
    );
}

#[test]
fn get_token_and_validate() {
    let server = new_server();
    init_tree(&server);

    let req = TokenRequest {
        entity: entity_with_secret("entity1", "entity1"),
        ..TokenRequest::default()
    };
    let resp = server.handle(Request::GetToken(req));
    assert_eq!(resp.code, WireCode::Ok);
    let token = resp.token.expect("token expected");

    let validate = TokenRequest {
        auth: auth(&token),
        ..TokenRequest::default()
    };
    assert_eq!(
        server.handle(Request::ValidateToken(validate)).code,
        WireCode::Ok
    );

    let invalid = TokenRequest {
        auth: auth(INVALID_TOKEN),
        ..TokenRequest::default()
    };
    assert_eq!(
        server.handle(Request::ValidateToken(invalid)).code,
        WireCode::Unauthenticated
    );
}

#[test]
fn entity_search_matches() {
    let server = new_server();
    init_tree(&server);

    let resp = server.handle(Request::EntitySearch(SearchRequest {
        expression: "entity".to_string(),
        ..SearchRequest::default()
    }));
    assert_eq!(resp.code, WireCode::Ok);
    assert_eq!(resp.entities.len(), 1);
    assert_eq!(resp.entities[0].id, "entity1");
    assert_eq!(resp.entities[0].secret.as_deref(), Some("<REDACTED>"));
}

#[test]
fn group_search_matches() {
    let server = new_server();
    init_tree(&server);

    let resp = server.handle(Request::GroupSearch(SearchRequest {
        expression: "group".to_string(),
        ..SearchRequest::default()
    }));
    assert_eq!(resp.code, WireCode::Ok);
    assert_eq!(resp.groups.len(), 2);
    assert_eq!(resp.groups[0].name, "group1");
    assert_eq!(resp.groups[1].name, "group2");

    // Display names match too.
    let resp = server.handle(Request::GroupSearch(SearchRequest {
        expression: "first".to_string(),
        ..SearchRequest::default()
    }));
    assert_eq!(resp.groups.len(), 1);
    assert_eq!(resp.groups[0].name, "group1");

    let resp = server.handle(Request::GroupSearch(SearchRequest {
        expression: "no-such-group".to_string(),
        ..SearchRequest::default()
    }));
    assert_eq!(resp.code, WireCode::Ok);
    assert!(resp.groups.is_empty());
}

#[test]
fn group_create_cases() {
    struct Case {
        token: &'static str,
        name: &'static str,
        readonly: bool,
        want: WireCode,
    }
    let cases = [
        Case { token: VALID_TOKEN, name: "test1", readonly: false, want: WireCode::Ok },
        Case { token: VALID_TOKEN, name: "test1", readonly: true, want: WireCode::ReadOnly },
        Case { token: INVALID_TOKEN, name: "test1", readonly: false, want: WireCode::Unauthenticated },
        Case { token: VALID_EMPTY_TOKEN, name: "test1", readonly: false, want: WireCode::RequestorUnqualified },
        Case { token: VALID_TOKEN, name: "group1", readonly: false, want: WireCode::Exists },
    ];

    for (i, case) in cases.iter().enumerate() {
        let server = new_server();
        init_tree(&server);
        server.directory().set_readonly(case.readonly);

        let req = GroupRequest {
            auth: auth(case.token),
            group: Some(Group::with_name(case.name)),
            ..GroupRequest::default()
        };
        let resp = server.handle(Request::GroupCreate(req));
        assert_eq!(resp.code, case.want, "case {i}: {}", resp.msg);
    }
}

#[test]
fn group_membership_over_rpc() {
    let server = new_server();
    init_tree(&server);

    let req = GroupRequest {
        auth: auth(VALID_TOKEN),
        group: Some(Group::with_name("group2")),
        entity: Some(Entity::with_id("admin")),
        ..GroupRequest::default()
    };
    assert_eq!(
        server.handle(Request::GroupAddMember(req.clone())).code,
        WireCode::Ok
    );

    let list = GroupRequest {
        group: Some(Group::with_name("group2")),
        ..GroupRequest::default()
    };
    let resp = server.handle(Request::GroupListMembers(list.clone()));
    assert_eq!(resp.code, WireCode::Ok);
    assert_eq!(resp.entities.len(), 1);
    assert_eq!(resp.entities[0].id, "admin");

    assert_eq!(
        server.handle(Request::GroupDelMember(req)).code,
        WireCode::Ok
    );
    let resp = server.handle(Request::GroupListMembers(list));
    assert!(resp.entities.is_empty());
}

#[test]
fn group_expansions_over_rpc() {
    let server = new_server();
    init_tree(&server);

    let mut delta = Group::with_name("group1");
    delta.expansions = vec!["INCLUDE:group2".to_string()];
    let req = GroupRequest {
        auth: auth(VALID_TOKEN),
        data: Some(delta),
        ..GroupRequest::default()
    };
    assert_eq!(
        server.handle(Request::GroupUpdateExpansion(req)).code,
        WireCode::Ok
    );
    assert_eq!(
        server.directory().get_group("group1").unwrap().expansions,
        vec!["INCLUDE:group2"]
    );

    // A rule against a missing target is rejected.
    let mut delta = Group::with_name("group1");
    delta.expansions = vec!["INCLUDE:missing".to_string()];
    let req = GroupRequest {
        auth: auth(VALID_TOKEN),
        data: Some(delta),
        ..GroupRequest::default()
    };
    assert_eq!(
        server.handle(Request::GroupUpdateExpansion(req)).code,
        WireCode::DoesNotExist
    );

    // Malformed rules never reach the directory.
    let mut delta = Group::with_name("group1");
    delta.expansions = vec!["NONSENSE".to_string()];
    let req = GroupRequest {
        auth: auth(VALID_TOKEN),
        data: Some(delta),
        ..GroupRequest::default()
    };
    assert_eq!(
        server.handle(Request::GroupUpdateExpansion(req)).code,
        WireCode::Malformed
    );
}

#[test]
fn managed_by_delegation_allows_group_edits() {
    let server = new_server();
    let dir = server.directory();
    dir.new_entity("valid", -1, "valid").unwrap();
    dir.new_group("stewards", "", "", -1).unwrap();
    dir.new_group("fleet", "", "stewards", -1).unwrap();
    dir.add_entity_to_group("valid", "stewards").unwrap();
    dir.new_entity("member", -1, "").unwrap();

    // The null token's claims name entity "valid" with no capabilities;
    // delegation through stewards still authorizes the mutation.
    let req = GroupRequest {
        auth: auth(VALID_EMPTY_TOKEN),
        group: Some(Group::with_name("fleet")),
        entity: Some(Entity::with_id("member")),
        ..GroupRequest::default()
    };
    assert_eq!(
        server.handle(Request::GroupAddMember(req)).code,
        WireCode::Ok
    );

    // No delegation on a group without managed_by.
    let req = GroupRequest {
        auth: auth(VALID_EMPTY_TOKEN),
        group: Some(Group::with_name("stewards")),
        entity: Some(Entity::with_id("member")),
        ..GroupRequest::default()
    };
    assert_eq!(
        server.handle(Request::GroupAddMember(req)).code,
        WireCode::RequestorUnqualified
    );
}
