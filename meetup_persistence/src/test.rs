use std::cell::{Ref, RefCell};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::registry::REGISTRY_CLASS_NAME;
use crate::{
    Entity, EntityId, InMemoryStorage, PersistenceError, Preferences, Reference, Registry,
    RegistryHolder, RegistryRecord, StorageAdapter, StorageContext,
};

#[derive(Debug)]
struct Tag {
    id: EntityId,
    label: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagRecord {
    label: String,
}

#[derive(Debug)]
struct Note {
    id: EntityId,
    text: String,
    tag: Option<Reference<Tag>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NoteRecord {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<Reference<Tag>>,
}

impl Entity for Tag {
    const CLASS_NAME: &'static str = "Tag";
    type Record = TagRecord;
    type Context = TestContext;

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> Self::Record {
        TagRecord {
            label: self.label.clone(),
        }
    }

    fn from_record(id: EntityId, record: Self::Record) -> Self {
        Tag {
            id,
            label: record.label,
        }
    }
}

impl Entity for Note {
    const CLASS_NAME: &'static str = "Note";
    type Record = NoteRecord;
    type Context = TestContext;

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> Self::Record {
        NoteRecord {
            text: self.text.clone(),
            tag: self.tag.clone(),
        }
    }

    fn from_record(id: EntityId, record: Self::Record) -> Self {
        Note {
            id,
            text: record.text,
            tag: record.tag,
        }
    }

    fn on_deserialized(&mut self, ctx: &Self::Context) {
        if let Some(tag) = &mut self.tag {
            tag.resolve(&ctx.tags);
        }
    }
}

#[derive(Debug)]
struct TestContext {
    storage: RefCell<Box<dyn StorageAdapter>>,
    preferences: RefCell<Preferences>,
    notes: Registry<Note>,
    tags: Registry<Tag>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            storage: RefCell::new(Box::new(InMemoryStorage::new())),
            preferences: RefCell::new(Preferences::allowing_local_storage()),
            notes: Registry::new(),
            tags: Registry::new(),
        }
    }

    fn set_allowed(&self, allowed: bool) {
        self.preferences.borrow_mut().local_storage_allowed = allowed;
    }

    fn stored(&self, key: &str) -> Option<Value> {
        self.storage
            .borrow()
            .get_item(key)
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    fn tag(&self, label: &str) -> crate::Live<Tag> {
        Tag::create(self, |id| {
            Ok::<_, PersistenceError>(Tag {
                id,
                label: label.to_string(),
            })
        })
        .unwrap()
    }

    fn note(&self, text: &str, tag: Option<&crate::Live<Tag>>) -> crate::Live<Note> {
        Note::create(self, |id| {
            Ok::<_, PersistenceError>(Note {
                id,
                text: text.to_string(),
                tag: tag.map(Reference::to),
            })
        })
        .unwrap()
    }
}

impl StorageContext for TestContext {
    fn storage(&self) -> &RefCell<Box<dyn StorageAdapter>> {
        &self.storage
    }

    fn preferences(&self) -> Ref<'_, Preferences> {
        self.preferences.borrow()
    }

    fn is_known_class(&self, class_name: &str) -> bool {
        matches!(class_name, "Note" | "Tag") || class_name == REGISTRY_CLASS_NAME
    }
}

impl RegistryHolder<Note> for TestContext {
    fn registry(&self) -> &Registry<Note> {
        &self.notes
    }
}

impl RegistryHolder<Tag> for TestContext {
    fn registry(&self) -> &Registry<Tag> {
        &self.tags
    }
}

fn free_note(id: u64) -> crate::Live<Note> {
    crate::live(Note {
        id: EntityId::new(id),
        text: format!("note {id}"),
        tag: None,
    })
}

#[test]
fn issued_ids_are_sequential_and_unique() {
    let ctx = TestContext::new();
    let ids = (0..4)
        .map(|i| ctx.note(&i.to_string(), None).borrow().id().raw())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(ctx.notes.len(), 4);
}

#[test]
fn duplicate_add_is_rejected_without_side_effects() {
    let ctx = TestContext::new();
    let original = free_note(2);
    ctx.notes.add(original.clone()).unwrap();

    let err = ctx.notes.add(free_note(2)).unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::DuplicateId { class: "Note", id } if id == EntityId::new(2)
    ));
    assert_eq!(ctx.notes.len(), 1);
    assert!(std::rc::Rc::ptr_eq(
        &ctx.notes.get(EntityId::new(2)).unwrap(),
        &original
    ));
}

#[test]
fn watermark_never_moves_back() {
    let ctx = TestContext::new();
    ctx.notes.add(free_note(10)).unwrap();
    assert_eq!(ctx.notes.next_id().unwrap(), EntityId::new(11));

    ctx.notes.add(free_note(3)).unwrap();
    assert_eq!(ctx.notes.object_count(), 12);

    ctx.notes.remove(EntityId::new(10)).unwrap();
    ctx.notes.remove(EntityId::new(11));
    assert_eq!(ctx.notes.next_id().unwrap(), EntityId::new(12));

    ctx.notes.clear();
    assert!(ctx.notes.is_empty());
    assert_eq!(ctx.notes.next_id().unwrap(), EntityId::new(13));
}

#[test]
fn exhausted_id_space_is_an_error() {
    let ctx = TestContext::new();
    ctx.notes.add(free_note(u64::MAX)).unwrap();
    assert_eq!(ctx.notes.object_count(), u64::MAX);

    assert!(matches!(
        ctx.notes.next_id(),
        Err(PersistenceError::IdSpaceExhausted { class: "Note" })
    ));
    let result = Note::create(&ctx, |id| {
        Ok::<_, PersistenceError>(Note {
            id,
            text: "overflow".to_string(),
            tag: None,
        })
    });
    assert!(matches!(
        result,
        Err(PersistenceError::IdSpaceExhausted { .. })
    ));
    assert_eq!(ctx.notes.len(), 1);
    assert_eq!(ctx.notes.object_count(), u64::MAX);
}

#[test]
fn removing_absent_id_is_a_no_op() {
    let ctx = TestContext::new();
    ctx.note("kept", None);
    assert!(ctx.notes.remove(EntityId::new(99)).is_none());
    assert_eq!(ctx.notes.len(), 1);
}

#[test]
fn failed_build_does_not_register() {
    let ctx = TestContext::new();
    let result = Note::create(&ctx, |_| {
        Err::<Note, _>(PersistenceError::MalformedRecord {
            key: "invalid".to_string(),
        })
    });
    assert!(result.is_err());
    assert!(ctx.notes.is_empty());
    // The issued ID is burned regardless
    assert_eq!(ctx.notes.next_id().unwrap(), EntityId::new(1));
}

#[test]
fn attribute_lookup_is_strict() {
    let ctx = TestContext::new();
    ctx.note("alpha", None);
    let beta = ctx.note("beta", None);

    let found = ctx
        .notes
        .find_by_attribute("text", &json!("beta"))
        .unwrap()
        .unwrap();
    assert!(std::rc::Rc::ptr_eq(&found, &beta));

    let by_id = ctx.notes.find_by_attribute("id", &json!(1)).unwrap().unwrap();
    assert!(std::rc::Rc::ptr_eq(&by_id, &beta));
    assert!(ctx.notes.find_by_attribute("id", &json!("1")).unwrap().is_none());
    assert!(ctx
        .notes
        .find_by_attribute("missing", &json!("beta"))
        .unwrap()
        .is_none());
    assert!(ctx.notes.find(|note| note.text == "alpha").is_some());
}

#[test]
fn records_store_references_as_placeholders() {
    let ctx = TestContext::new();
    let tag = ctx.tag("urgent");
    let note = ctx.note("call back", Some(&tag));
    note.borrow().write_object(&ctx).unwrap();

    assert_eq!(
        ctx.stored("dk.example.meetup-app.Note.0").unwrap(),
        json!({
            "_className": "Note",
            "_id": 0,
            "text": "call back",
            "tag": {"_className": "Tag", "_id": 0},
        })
    );
}

#[test]
fn registry_record_lists_placeholders_only() {
    let ctx = TestContext::new();
    ctx.note("a", None);
    ctx.note("b", None);

    let record = serde_json::to_value(ctx.notes.to_record()).unwrap();
    assert_eq!(record["_className"], json!("ObjectRegistry"));
    assert_eq!(record["_objectClassName"], json!("Note"));
    assert_eq!(record["_objectCount"], json!(2));
    assert_eq!(
        record["_objectList"],
        json!({
            "0": {"_className": "Note", "_id": 0},
            "1": {"_className": "Note", "_id": 1},
        })
    );
}

#[test]
fn cascade_save_writes_every_object() {
    let ctx = TestContext::new();
    for text in ["a", "b", "c"] {
        ctx.note(text, None);
    }
    ctx.notes.write_object(&ctx).unwrap();

    for id in 0..3 {
        let stored = ctx
            .stored(&format!("dk.example.meetup-app.Note.{id}"))
            .unwrap();
        assert_eq!(stored["_className"], json!("Note"));
        assert_eq!(stored["_id"], json!(id));
    }
    let registry_key = format!("dk.example.meetup-app.ObjectRegistry.{}", ctx.notes.id());
    let record: RegistryRecord =
        serde_json::from_value(ctx.stored(&registry_key).unwrap()).unwrap();
    assert_eq!(record.object_list.len(), 3);
}

#[test]
fn full_store_reload_finds_individually_saved_objects() {
    let ctx = TestContext::new();
    ctx.note("skipped", None);
    for text in ["x", "y", "z"] {
        ctx.note(text, None).borrow().write_object(&ctx).unwrap();
    }
    ctx.tag("other class").borrow().write_object(&ctx).unwrap();

    ctx.notes.clear();
    assert_eq!(ctx.notes.read_objects(&ctx).unwrap(), 3);
    assert_eq!(
        ctx.notes.objects().ids().map(|e| e.raw()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(ctx.notes.get(EntityId::new(2)).unwrap().borrow().text, "y");
}

#[test]
fn zero_padded_keys_do_not_alias_stored_objects() {
    let ctx = TestContext::new();
    ctx.note("only", None).borrow().write_object(&ctx).unwrap();
    let body = ctx
        .storage
        .borrow()
        .get_item("dk.example.meetup-app.Note.0")
        .unwrap();
    ctx.storage
        .borrow_mut()
        .set_item("dk.example.meetup-app.Note.00", body)
        .unwrap();

    ctx.notes.clear();
    assert_eq!(ctx.notes.read_objects(&ctx).unwrap(), 1);
    assert_eq!(ctx.notes.get(EntityId::new(0)).unwrap().borrow().text, "only");
}

#[test]
fn references_resolve_only_after_second_phase() {
    let ctx = TestContext::new();
    let tag = ctx.tag("home");
    let note = ctx.note("water plants", Some(&tag));
    ctx.tags.write_object(&ctx).unwrap();
    ctx.notes.write_object(&ctx).unwrap();

    // Notes are loaded before the tags they reference
    ctx.notes.read_objects(&ctx).unwrap();
    ctx.tags.read_objects(&ctx).unwrap();
    let loaded = ctx.notes.get(note.borrow().id()).unwrap();
    assert!(!std::rc::Rc::ptr_eq(&loaded, &note));
    assert!(!loaded.borrow().tag.as_ref().unwrap().is_resolved());

    ctx.notes.on_deserialized(&ctx);
    let loaded = loaded.borrow();
    let tag = loaded.tag.as_ref().unwrap().get().unwrap();
    assert_eq!(tag.borrow().label, "home");
    assert!(std::rc::Rc::ptr_eq(tag, &ctx.tags.get(EntityId::new(0)).unwrap()));
}

#[test]
fn dangling_placeholder_is_kept() {
    let ctx = TestContext::new();
    let tag = ctx.tag("gone");
    let note = ctx.note("orphan", Some(&tag));
    note.borrow().write_object(&ctx).unwrap();
    ctx.tags.remove(EntityId::new(0));

    ctx.notes.read_objects(&ctx).unwrap();
    ctx.notes.on_deserialized(&ctx);
    let loaded = ctx.notes.get(EntityId::new(0)).unwrap();
    let loaded = loaded.borrow();
    let reference = loaded.tag.as_ref().unwrap();
    assert!(!reference.is_resolved());
    assert_eq!(reference.id(), EntityId::new(0));
}

#[test]
fn closed_gate_blocks_reads_and_writes() {
    let ctx = TestContext::new();
    let note = ctx.note("secret", None);
    note.borrow().write_object(&ctx).unwrap();
    ctx.set_allowed(false);

    assert!(matches!(
        note.borrow().write_object(&ctx),
        Err(PersistenceError::PermissionDenied)
    ));
    assert!(matches!(
        Note::read_object(&ctx, EntityId::new(0)),
        Err(PersistenceError::PermissionDenied)
    ));
    assert!(matches!(
        ctx.notes.write_object(&ctx),
        Err(PersistenceError::PermissionDenied)
    ));
    assert!(matches!(
        ctx.notes.read_objects(&ctx),
        Err(PersistenceError::PermissionDenied)
    ));
    // The gate failed before the registry was cleared
    assert_eq!(ctx.notes.len(), 1);
    assert_eq!(ctx.storage.borrow().len(), 1);
}

#[test]
fn reading_missing_record_fails() {
    let ctx = TestContext::new();
    assert!(matches!(
        Note::from_storage(&ctx, EntityId::new(4)),
        Err(PersistenceError::NotFound { key }) if key == "dk.example.meetup-app.Note.4"
    ));
    assert!(ctx.notes.is_empty());
}

#[test]
fn remove_object_is_idempotent() {
    let ctx = TestContext::new();
    let note = ctx.note("temp", None);
    note.borrow().write_object(&ctx).unwrap();

    assert!(note.borrow().remove_object(&ctx).unwrap());
    assert!(note.borrow().remove_object(&ctx).unwrap());
    assert!(ctx.storage.borrow().is_empty());
}

#[test]
fn delete_evicts_from_registry_and_storage() {
    let ctx = TestContext::new();
    let note = ctx.note("bye", None);
    note.borrow().write_object(&ctx).unwrap();

    Note::delete(&note, &ctx).unwrap();
    assert!(ctx.notes.is_empty());
    assert!(ctx.stored("dk.example.meetup-app.Note.0").is_none());
    // Deleting twice is tolerated
    Note::delete(&note, &ctx).unwrap();
}

#[test]
fn update_saves_only_when_allowed() {
    let ctx = TestContext::new();
    let note = ctx.note("draft", None);

    Note::update(&note, &ctx, |note| {
        note.text = "final".to_string();
        Ok::<_, PersistenceError>(())
    })
    .unwrap();
    assert_eq!(
        ctx.stored("dk.example.meetup-app.Note.0").unwrap()["text"],
        json!("final")
    );

    ctx.set_allowed(false);
    Note::update(&note, &ctx, |note| {
        note.text = "offline".to_string();
        Ok::<_, PersistenceError>(())
    })
    .unwrap();
    assert_eq!(note.borrow().text, "offline");
    ctx.set_allowed(true);
    assert_eq!(
        ctx.stored("dk.example.meetup-app.Note.0").unwrap()["text"],
        json!("final")
    );
}

#[test]
fn watermark_survives_a_new_session() {
    let ctx = TestContext::new();
    for text in ["a", "b", "c"] {
        ctx.note(text, None);
    }
    ctx.notes.write_object(&ctx).unwrap();
    let last = ctx.notes.get(EntityId::new(2)).unwrap();
    Note::delete(&last, &ctx).unwrap();

    let storage = ctx.storage.replace(Box::new(InMemoryStorage::new()));
    let next_session = TestContext::new();
    *next_session.storage.borrow_mut() = storage;

    next_session.notes.read_objects(&next_session).unwrap();
    assert_eq!(next_session.notes.next_id().unwrap(), EntityId::new(2));

    next_session.notes.restore_watermark(&next_session).unwrap();
    assert_eq!(next_session.notes.next_id().unwrap(), EntityId::new(3));
}
