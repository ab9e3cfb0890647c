use redis_emu::catalog::{Catalog, CatalogError, CommandFlag};

const EMPTY_DOCS: &[u8] = b"*0\r\n";

#[test]
fn test_container_commands_index_their_subcommands() {
    let catalog = Catalog::load_embedded().unwrap();

    let client = catalog.lookup("CLIENT").unwrap();
    assert!(client.has_subcommands());
    assert!(client
        .subcommands
        .iter()
        .any(|subcommand| subcommand.name == "client|setinfo"));

    let setinfo = catalog.lookup("Client|SetInfo").unwrap();
    assert!(!setinfo.has_subcommands());
    assert!(setinfo.arity.accepts(4));
    assert!(!setinfo.arity.accepts(3));
}

#[test]
fn test_write_commands_are_flagged() {
    let catalog = Catalog::load_embedded().unwrap();

    for name in ["set", "del", "lpush", "hset", "sadd", "zadd", "flushall"] {
        assert!(catalog.lookup(name).unwrap().is_write(), "{} should be a write", name);
    }
    for name in ["get", "llen", "hget", "smembers", "zrange", "ping"] {
        assert!(!catalog.lookup(name).unwrap().is_write(), "{} should not be a write", name);
    }
    assert!(catalog.lookup("get").unwrap().has_flag(CommandFlag::Fast));
}

#[test]
fn test_every_command_has_docs() {
    let catalog = Catalog::load_embedded().unwrap();

    for definition in catalog.commands() {
        assert!(catalog.info(&definition.name).is_some(), "{} has no docs", definition.name);
    }
}

#[test]
fn test_disable_hides_command() {
    let catalog = Catalog::load_embedded().unwrap();
    let before = catalog.len();

    catalog.disable("KEYS");

    assert!(catalog.is_disabled("keys"));
    assert!(catalog.lookup("keys").is_some());
    assert_eq!(catalog.len(), before - 1);
    assert!(catalog.commands().all(|definition| definition.name != "keys"));
}

#[test]
fn test_disabling_a_subcommand_keeps_its_parent() {
    let catalog = Catalog::load_embedded().unwrap();
    let before = catalog.len();

    catalog.disable("client|setinfo");

    assert!(catalog.is_disabled("client|setinfo"));
    assert!(!catalog.is_disabled("client"));
    assert_eq!(catalog.len(), before);
}

#[test]
fn test_truncated_resource_reports_position() {
    let commands = b"*1\r\n*7\r\n$4\r\nping\r\n:-1\r\n";

    match Catalog::from_resources(commands, EMPTY_DOCS) {
        Err(CatalogError::Decode { resource, source }) => {
            assert_eq!(resource, "commands");
            assert_eq!(source.position(), commands.len());
        }
        other => panic!("expected a decode error, got {:?}", other),
    }
}

#[test]
fn test_invalid_entries_are_rejected() {
    let bad_arity = b"*1\r\n*7\r\n$4\r\nping\r\n:0\r\n*0\r\n:0\r\n:0\r\n:0\r\n*0\r\n";
    assert!(matches!(
        Catalog::from_resources(bad_arity, EMPTY_DOCS),
        Err(CatalogError::Invalid { .. })
    ));

    let unknown_flag = b"*1\r\n*7\r\n$4\r\nping\r\n:1\r\n*1\r\n+bogus\r\n:0\r\n:0\r\n:0\r\n*0\r\n";
    assert!(matches!(
        Catalog::from_resources(unknown_flag, EMPTY_DOCS),
        Err(CatalogError::Invalid { .. })
    ));

    let misnamed_subcommand = b"*1\r\n*7\r\n$6\r\nclient\r\n:-2\r\n*0\r\n:0\r\n:0\r\n:0\r\n*1\r\n*7\r\n$6\r\nfoo|id\r\n:2\r\n*0\r\n:0\r\n:0\r\n:0\r\n*0\r\n";
    assert!(matches!(
        Catalog::from_resources(misnamed_subcommand, EMPTY_DOCS),
        Err(CatalogError::Invalid { .. })
    ));
}
