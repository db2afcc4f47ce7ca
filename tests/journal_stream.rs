//! Journal-profile streams: many length-prefixed entries sharing one
//! stream, read back one at a time, with caller-stable command tags.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::sync::Arc;

use arkiv::{
    EntryPayload, FieldKind, FramingError, JournalEntry, ProfileConfigurator, TypeKey,
    TypeRegistry, Value, WireError,
};
use tempfile::tempdir;

const ADD_ITEM: &str = "test.add_item";
const REMOVE_ITEM: &str = "test.remove_item";
const MODEL: &str = "todo.model";

fn journal_setup() -> (Arc<TypeRegistry>, ProfileConfigurator) {
    let registry = Arc::new(TypeRegistry::new());
    registry.register_with_tag(ADD_ITEM, 1).unwrap();
    registry
        .register_field(ADD_ITEM, 1, "item_name", FieldKind::Str)
        .unwrap();
    registry.register_with_tag(REMOVE_ITEM, 2).unwrap();
    registry
        .register_field(REMOVE_ITEM, 1, "id", FieldKind::Str)
        .unwrap();

    let configurator = ProfileConfigurator::new(Arc::clone(&registry));
    (registry, configurator)
}

fn command_tags() -> BTreeMap<TypeKey, u32> {
    let mut tags = BTreeMap::new();
    tags.insert(TypeKey::new(ADD_ITEM), 1);
    tags.insert(TypeKey::new(REMOVE_ITEM), 2);
    tags
}

fn add_item(name: &str) -> arkiv::ObjRef {
    arkiv::Instance::new(ADD_ITEM, vec![Value::str(name)]).shared()
}

#[test]
fn command_entries_roundtrip_in_write_order() {
    let (_registry, configurator) = journal_setup();
    let journal = configurator.journal(&command_tags()).unwrap();

    let entries = vec![
        JournalEntry::model_created(1, MODEL).with_created(100),
        JournalEntry::command(2, add_item("Fish")).with_created(200),
        JournalEntry::command(3, add_item("Bread")).with_created(300),
        JournalEntry::rollback(4).with_created(400),
    ];

    let mut writer = journal.writer(Vec::new());
    for entry in &entries {
        writer.append(entry).unwrap();
    }
    assert_eq!(writer.entries_written(), 4);
    let stream = writer.into_inner();

    let resurrected: Vec<JournalEntry> = journal
        .reader(stream.as_slice())
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(resurrected.len(), 4);
    for (entry, back) in entries.iter().zip(&resurrected) {
        assert_eq!(entry.id, back.id);
        assert_eq!(entry.created, back.created);
    }

    match &resurrected[0].payload {
        EntryPayload::ModelCreated(model) => assert_eq!(model.as_str(), MODEL),
        other => panic!("unexpected payload: {other:?}"),
    }
    match &resurrected[1].payload {
        EntryPayload::Command(command) => {
            let command = command.borrow();
            assert_eq!(command.type_key.as_str(), ADD_ITEM);
            assert_eq!(command.field(0).unwrap().as_str(), Some("Fish"));
        }
        other => panic!("unexpected payload: {other:?}"),
    }
    assert!(matches!(resurrected[3].payload, EntryPayload::Rollback));
}

#[test]
fn journal_survives_a_file_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.bin");

    let (_registry, configurator) = journal_setup();
    let journal = configurator.journal(&command_tags()).unwrap();

    {
        let file = File::create(&path).unwrap();
        let mut writer = journal.writer(BufWriter::new(file));
        for i in 0..10u64 {
            writer
                .append(&JournalEntry::command(i, add_item(&format!("item-{i}"))))
                .unwrap();
        }
        writer.flush().unwrap();
        writer.into_inner().into_inner().unwrap().sync_all().unwrap();
    }

    let file = File::open(&path).unwrap();
    let entries: Vec<JournalEntry> = journal
        .reader(BufReader::new(file))
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(entries.len(), 10);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.id, i as u64);
        match &entry.payload {
            EntryPayload::Command(command) => {
                assert_eq!(
                    command.borrow().field(0).unwrap().as_str(),
                    Some(format!("item-{i}").as_str())
                );
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}

#[test]
fn truncated_final_entry_does_not_lose_earlier_entries() {
    let (_registry, configurator) = journal_setup();
    let journal = configurator.journal(&command_tags()).unwrap();

    let mut writer = journal.writer(Vec::new());
    writer.append(&JournalEntry::command(1, add_item("Fish"))).unwrap();
    writer.append(&JournalEntry::command(2, add_item("Bread"))).unwrap();
    let mut stream = writer.into_inner();

    // Simulate a torn write of the last entry.
    stream.truncate(stream.len() - 5);

    let mut reader = journal.reader(stream.as_slice());
    let first = reader.read_entry().unwrap().unwrap();
    assert_eq!(first.id, 1);

    let err = reader.read_entry().unwrap_err();
    assert!(matches!(
        err,
        WireError::Framing(FramingError::TruncatedStream { .. })
    ));
}

#[test]
fn bad_entry_is_skippable_because_frames_are_length_delimited() {
    let (_registry, configurator) = journal_setup();
    let journal = configurator.journal(&command_tags()).unwrap();

    // First and third entries are real; the middle frame carries a valid
    // length prefix over garbage bytes.
    let mut writer = journal.writer(Vec::new());
    writer.append(&JournalEntry::command(1, add_item("Fish"))).unwrap();
    let mut stream = writer.into_inner();

    let garbage = [0x00u8, 0x7B, 0x7B, 0x7B]; // fresh marker + unknown tag
    stream.push(garbage.len() as u8); // varint length prefix
    stream.extend_from_slice(&garbage);

    let mut writer = journal.writer(stream);
    writer.append(&JournalEntry::command(3, add_item("Milk"))).unwrap();
    let stream = writer.into_inner();

    let mut reader = journal.reader(stream.as_slice());
    assert_eq!(reader.read_entry().unwrap().unwrap().id, 1);

    // The bad entry fails on its own...
    assert!(reader.read_entry().is_err());

    // ...and the reader is already positioned at the next frame.
    let third = reader.read_entry().unwrap().unwrap();
    assert_eq!(third.id, 3);
    assert_eq!(reader.read_entry().unwrap().map(|e| e.id), None);
}

#[test]
fn unregistered_command_type_is_rejected_at_append() {
    let (registry, configurator) = journal_setup();
    let journal = configurator.journal(&command_tags()).unwrap();

    // A command type the registry knows nothing about at all.
    let rogue = arkiv::Instance::new("test.rogue", vec![]).shared();
    let mut writer = journal.writer(Vec::new());
    let err = writer.append(&JournalEntry::command(1, rogue)).unwrap_err();
    assert!(matches!(
        err,
        WireError::Dispatch(arkiv::DispatchError::UnregisteredType { .. })
    ));

    // A registered type that was never declared a command subtype.
    registry.register_with_tag("test.standalone", 50).unwrap();
    let standalone = arkiv::Instance::new("test.standalone", vec![]).shared();
    let err = writer
        .append(&JournalEntry::command(2, standalone))
        .unwrap_err();
    assert!(matches!(
        err,
        WireError::Dispatch(arkiv::DispatchError::NotASubtype { .. })
    ));

    // Nothing was emitted for the failed appends.
    assert_eq!(writer.entries_written(), 0);
    assert!(writer.into_inner().is_empty());
}

#[test]
fn reader_and_writer_must_agree_on_framing() {
    let (_registry, configurator) = journal_setup();
    let journal = configurator.journal(&command_tags()).unwrap();

    let mut writer = journal.writer(Vec::new());
    writer.append(&JournalEntry::rollback(1)).unwrap();
    let mut stream_bytes = writer.into_inner();

    // A reader that seeks into the middle of a frame sees framing garbage,
    // not a silent misread.
    let mut cursor = std::io::Cursor::new(&mut stream_bytes);
    cursor.seek(SeekFrom::Start(1)).unwrap();
    let mut reader = journal.reader(cursor);
    assert!(reader.read_entry().is_err());
}

#[test]
fn writer_buffers_whole_frames_before_the_stream_sees_them() {
    // The frame only reaches the stream complete: length prefix first,
    // payload exactly as long as declared.
    let (_registry, configurator) = journal_setup();
    let journal = configurator.journal(&command_tags()).unwrap();

    struct CountingWrites {
        chunks: Vec<usize>,
    }
    impl Write for CountingWrites {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.chunks.push(buf.len());
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let mut writer = journal.writer(CountingWrites { chunks: Vec::new() });
    writer.append(&JournalEntry::rollback(1)).unwrap();
    let sink = writer.into_inner();

    // One header write, one payload write per frame.
    assert_eq!(sink.chunks.len(), 2);
}
