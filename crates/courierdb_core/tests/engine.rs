//! Integration tests driving the engine through full store lifecycles.

use courierdb_core::{ChunkStorage, CoreError, Engine, Era, ANONYMOUS_OWNER, DEFAULT_OWNER};
use std::fs;

#[test]
fn messages_span_eras_through_cache() {
    let temp = tempfile::tempdir().unwrap();
    let engine = Engine::open(temp.path()).unwrap();

    engine.add("inbox/msg", b"hello").unwrap();
    engine.new_era().unwrap();
    engine.add("inbox/msg", b"world").unwrap();

    let cache = engine
        .chunk_cache("inbox/msg", Era::ZERO, engine.era())
        .unwrap();
    assert_eq!(cache.size(), 2);

    let collected: Vec<&[u8]> = cache.messages().collect();
    assert_eq!(collected, vec![&b"hello"[..], &b"world"[..]]);
    assert_eq!(cache.message_at(0, true).unwrap(), b"hello");
    assert_eq!(cache.message_at(0, false).unwrap(), b"world");
}

#[test]
fn state_survives_reopen() {
    let temp = tempfile::tempdir().unwrap();

    {
        let engine = Engine::open_with_owner(temp.path(), "alice").unwrap();
        engine.add("u", b"kept").unwrap();
        engine.new_era().unwrap();
        engine.new_era().unwrap();
        engine.set_last_seen("bob", Era::new(1)).unwrap();
    }

    let engine = Engine::open(temp.path()).unwrap();
    assert_eq!(engine.owner(), "alice");
    assert_eq!(engine.era(), Era::new(2));
    assert_eq!(engine.oldest_era(), Era::ZERO);
    assert_eq!(engine.last_seen("bob"), Some(Era::new(1)));

    let chunk = engine.chunk_storage().chunk("u", Era::ZERO).unwrap();
    assert_eq!(chunk.messages(), &[b"kept".to_vec()]);
}

#[test]
fn ownership_conflict_on_reopen() {
    let temp = tempfile::tempdir().unwrap();

    {
        Engine::open_with_owner(temp.path(), "alice").unwrap();
    }

    // a different concrete owner is rejected and nothing is persisted
    let result = Engine::open_with_owner(temp.path(), "bob");
    assert!(matches!(result, Err(CoreError::OwnershipConflict { .. })));

    // the same owner and sentinel values stay no-ops
    {
        let engine = Engine::open_with_owner(temp.path(), "alice").unwrap();
        assert_eq!(engine.owner(), "alice");
    }
    {
        let engine = Engine::open_with_owner(temp.path(), ANONYMOUS_OWNER).unwrap();
        assert_eq!(engine.owner(), "alice");
    }
    let engine = Engine::open_with_owner(temp.path(), DEFAULT_OWNER).unwrap();
    assert_eq!(engine.owner(), "alice");
}

#[test]
fn second_process_is_locked_out() {
    let temp = tempfile::tempdir().unwrap();
    let _engine = Engine::open(temp.path()).unwrap();

    let result = Engine::open(temp.path());
    assert!(matches!(result, Err(CoreError::StoreLocked)));
}

#[test]
fn corrupted_state_fails_loudly_on_reopen() {
    let temp = tempfile::tempdir().unwrap();
    {
        let engine = Engine::open_with_owner(temp.path(), "alice").unwrap();
        engine.set_last_seen("bob", Era::new(3)).unwrap();
    }

    let state_path = temp.path().join("STATE");
    let data = fs::read(&state_path).unwrap();
    fs::write(&state_path, &data[..data.len() - 1]).unwrap();

    let result = Engine::open(temp.path());
    assert!(matches!(result, Err(CoreError::StateCorrupted { .. })));
}

#[test]
fn incoming_chunks_flow_through_scoped_storage() {
    let temp = tempfile::tempdir().unwrap();
    let engine = Engine::open(temp.path()).unwrap();

    // the synchronization layer deposits chunks received from bob
    let from_bob = engine.incoming_chunk_storage("bob").unwrap();
    from_bob.append_message("news", Era::ZERO, b"bulletin 1").unwrap();
    from_bob.append_message("news", Era::ZERO, b"bulletin 2").unwrap();

    // the local scope is untouched
    assert!(engine.chunk_storage().chunk("news", Era::ZERO).unwrap().is_empty());

    // an app reads bob's stream era-agnostically
    let cache = from_bob.chunk_cache("news", Era::ZERO, Era::ZERO).unwrap();
    assert_eq!(cache.size(), 2);
    assert_eq!(cache.message_at(0, true).unwrap(), b"bulletin 1");
}

#[test]
fn senders_enumeration_survives_reopen() {
    let temp = tempfile::tempdir().unwrap();

    {
        let engine = Engine::open(temp.path()).unwrap();
        engine.incoming_chunk_storage("bob").unwrap();
        engine.incoming_chunk_storage("peer/with:odd chars").unwrap();
    }

    let engine = Engine::open(temp.path()).unwrap();
    assert_eq!(
        engine.senders().unwrap(),
        vec!["bob".to_string(), "peer/with:odd chars".to_string()]
    );
}

#[test]
fn transmission_view_by_era() {
    let temp = tempfile::tempdir().unwrap();
    let engine = Engine::open(temp.path()).unwrap();

    engine.add("a", b"one").unwrap();
    engine.add("b", b"two").unwrap();
    engine.add_recipient("a", "bob").unwrap();
    let closed = engine.new_era().unwrap();
    engine.add("a", b"three").unwrap();

    // everything producible for the closed era, across uris
    let chunks = engine.chunk_storage().chunks(closed).unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].uri(), "a");
    assert!(chunks[0].recipients().contains("bob"));
    assert_eq!(chunks[1].uri(), "b");

    // the new era only carries what came after rotation
    let current = engine.chunk_storage().chunks(engine.era()).unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].messages(), &[b"three".to_vec()]);
}

#[test]
fn retirement_drops_chunks_and_persists_boundary() {
    let temp = tempfile::tempdir().unwrap();

    {
        let engine = Engine::open(temp.path()).unwrap();
        engine.add("u", b"old").unwrap();
        engine.new_era().unwrap();
        engine.add("u", b"new").unwrap();
        assert_eq!(engine.retire_oldest_era().unwrap(), Some(Era::ZERO));
    }

    let engine = Engine::open(temp.path()).unwrap();
    assert_eq!(engine.oldest_era(), Era::new(1));
    assert!(engine.chunk_storage().chunks(Era::ZERO).unwrap().is_empty());
    assert_eq!(
        engine.chunk_storage().chunk("u", Era::new(1)).unwrap().messages(),
        &[b"new".to_vec()]
    );
}

#[test]
fn cache_refreshes_after_storage_mutation() {
    let temp = tempfile::tempdir().unwrap();
    let engine = Engine::open(temp.path()).unwrap();

    engine.add("u", b"first").unwrap();
    let mut cache = engine.chunk_cache("u", Era::ZERO, Era::ZERO).unwrap();
    assert_eq!(cache.size(), 1);

    engine.add("u", b"second").unwrap();
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.message_count().unwrap(), 2);

    cache.sync().unwrap();
    assert_eq!(cache.size(), 2);
}
