use std::sync::Arc;

use super::*;
use crate::asset::{AssetType, Value, ValueType};
use crate::registry::{KindSchema, SchemaError};

struct Mesh;
impl AssetType for Mesh {
    const KIND: AssetKind = AssetKind::from_static("mesh");
}
struct Frame;
impl AssetType for Frame {
    const KIND: AssetKind = AssetKind::from_static("frame");
}
const MESH: AssetKind = Mesh::KIND;
const FRAME: AssetKind = Frame::KIND;

fn path(text: &str) -> AssetPath {
    AssetPath::parse(text).unwrap()
}
/// Collects everything delivered to a channel, as text, in delivery order.
#[derive(Clone, Default)]
struct Log(Arc<parking_lot::Mutex<Vec<String>>>);
impl Log {
    fn push(&self, entry: String) {
        self.0.lock().push(entry);
    }
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}
/// Subscribe to every asset channel, logging into one shared list.
fn watch_all(project: &Project, log: &Log) -> Vec<Watch> {
    vec![
        project.subscribe_disappear({
            let log = log.clone();
            move |e| log.push(format!("-{}", e.path))
        }),
        project.subscribe_appear({
            let log = log.clone();
            move |e| log.push(format!("+{}", e.path))
        }),
        project.subscribe_field_changes({
            let log = log.clone();
            move |e| log.push(format!("~{}.{}", e.path, e.field))
        }),
        project.subscribe_history({
            let log = log.clone();
            move |e| log.push(format!("!{}", e.description()))
        }),
    ]
}

#[test]
fn rename_and_undo_scenario() {
    let project = Project::new();
    project
        .transact("create", |tx| {
            tx.create("m/a", MESH);
        })
        .unwrap();
    assert!(project.resolve("m/a", &MESH).is_some());

    project
        .transact("rename", |tx| {
            tx.rename("m/a", "m/b");
        })
        .unwrap();
    assert!(project.resolve("m/a", &MESH).is_none());
    assert!(project.resolve("m/b", &MESH).is_some());

    assert_eq!(project.undo(), Ok(true));
    assert!(project.resolve("m/a", &MESH).is_some());
    assert!(project.resolve("m/b", &MESH).is_none());

    assert_eq!(project.undo(), Ok(true));
    assert!(project.resolve("m/a", &MESH).is_none());
    assert!(project.snapshot().is_empty());
    // At the start, undo is a no-op.
    assert_eq!(project.undo(), Ok(false));
}

#[test]
fn undo_round_trip_and_redo_replay() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("a", MESH)
                .set_field("a", "colors", 3i64)
                .create("a/child", FRAME)
                .create("gone", FRAME)
                .set_field("gone", "index", 1i64);
        })
        .unwrap();
    let before = project.snapshot();

    project
        .transact("edit", |tx| {
            tx.set_field("a", "colors", 4i64)
                .clear_field("gone", "index")
                .destroy("gone")
                .rename("a", "b")
                .create("a", FRAME)
                .set_field("a", "name", "replacement");
        })
        .unwrap();
    let after = project.snapshot();
    assert_ne!(before, after);
    assert_eq!(
        project.resolve("b", &MESH).unwrap().field(&"colors".into()),
        Some(&Value::Int(4))
    );
    assert!(project.resolve("b/child", &FRAME).is_some());

    project.undo().unwrap();
    assert_eq!(project.snapshot(), before);
    project.redo().unwrap();
    assert_eq!(project.snapshot(), after);
    // At the end, redo is a no-op.
    assert_eq!(project.redo(), Ok(false));
    assert_eq!(project.revision(), 4);
}

#[test]
fn new_commit_prunes_redo() {
    let project = Project::new();
    for name in ["a", "b", "c"] {
        project
            .transact(format!("create {name}"), |tx| {
                tx.create(name, MESH);
            })
            .unwrap();
    }
    project.undo().unwrap();
    project.undo().unwrap();
    assert_eq!(project.history().redo_description(), Some("create b"));

    project
        .transact("create d", |tx| {
            tx.create("d", MESH);
        })
        .unwrap();
    let history = project.history();
    assert!(!history.can_redo());
    assert_eq!(history.applied().collect::<Vec<_>>(), ["create a", "create d"]);
    assert_eq!(project.redo(), Ok(false));
    assert!(project.resolve("b", &MESH).is_none());
}

#[test]
fn reference_follows_the_slot() {
    let project = Project::new();
    let p = project.reference_to::<Mesh>("p").unwrap();
    p.create(&mut project.build_transaction("unused"));
    assert!(!p.ok(), "recording alone changes nothing");

    project.transact("create", |tx| {
        p.create(tx);
    })
    .unwrap();
    assert!(p.ok());

    project.transact("destroy", |tx| {
        p.destroy(tx);
    })
    .unwrap();
    assert!(!p.ok());

    project
        .transact("recreate", |tx| {
            tx.create("p", MESH);
        })
        .unwrap();
    assert!(p.ok());

    project.transact("rename away", |tx| {
        p.rename(tx, "q");
    })
    .unwrap();
    assert!(!p.ok());
    assert!(p.retarget("q").unwrap().ok());

    // Same path, wrong kind
    project
        .transact("recreate as frame", |tx| {
            tx.create("p", FRAME);
        })
        .unwrap();
    assert!(!p.ok());
}

#[test]
fn conflict_leaves_project_unchanged() {
    let project = Project::new();
    project
        .transact("create", |tx| {
            tx.create("m/a", MESH).create("other", MESH);
        })
        .unwrap();
    let before = project.snapshot();
    let log = Log::default();
    let _watches = watch_all(&project, &log);

    // Earlier ops in the transaction would succeed, they must not leak out.
    let result = project.transact("clash", |tx| {
        tx.destroy("other").create("new", FRAME).create("m/a", FRAME);
    });
    assert_eq!(result, Err(ApplyError::PathConflict(path("m/a"))));
    assert_eq!(project.snapshot(), before);
    assert_eq!(project.revision(), before.revision());
    assert_eq!(project.history().len(), 1);
    assert!(log.take().is_empty());

    assert_eq!(
        project.transact("missing", |tx| {
            tx.set_field("nope", "x", 1i64);
        }),
        Err(ApplyError::NotFound(path("nope")))
    );
    assert_eq!(
        project.transact("bad path", |tx| {
            tx.destroy("m//a");
        }),
        Err(ApplyError::InvalidPath(PathError::EmptySegment {
            path: "m//a".into(),
            index: 1
        }))
    );
    assert_eq!(
        project.transact("", |tx| {
            tx.destroy("m/a");
        }),
        Err(ApplyError::MissingDescription)
    );
    assert_eq!(
        project.transact("nothing", |_| ()),
        Err(ApplyError::EmptyTransaction)
    );
    assert_eq!(project.snapshot(), before);
}

#[test]
fn rename_conflicts() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("a", MESH).create("a/x", MESH).create("b/x", MESH);
        })
        .unwrap();
    // Occupied somewhere below the target
    assert_eq!(
        project.transact("move", |tx| {
            tx.rename("a", "b");
        }),
        Err(ApplyError::PathConflict(path("b/x")))
    );
    assert_eq!(
        project.transact("move onto itself", |tx| {
            tx.rename("a", "a");
        }),
        Err(ApplyError::PathConflict(path("a")))
    );
    assert_eq!(
        project.transact("move nothing", |tx| {
            tx.rename("c", "d");
        }),
        Err(ApplyError::NotFound(path("c")))
    );
    // Moving below itself only collides with itself.
    project
        .transact("nest", |tx| {
            tx.rename("a", "a/inner");
        })
        .unwrap();
    assert!(project.resolve("a/inner", &MESH).is_some());
    assert!(project.resolve("a/inner/x", &MESH).is_some());
    project.undo().unwrap();
    assert!(project.resolve("a", &MESH).is_some());
    assert!(project.resolve("a/x", &MESH).is_some());
    assert!(project.resolve("a/inner", &MESH).is_none());
}

#[test]
fn rename_onto_own_child_conflicts() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("a", MESH).create("a/b", FRAME);
        })
        .unwrap();
    let before = project.snapshot();
    assert_eq!(
        project.transact("move", |tx| {
            tx.rename("a", "a/b");
        }),
        Err(ApplyError::PathConflict(path("a/b")))
    );
    assert_eq!(project.snapshot(), before);
    assert_eq!(project.resolve_any("a/b").unwrap().kind(), &FRAME);
}

#[test]
fn rename_into_populated_slot() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("models/foo", MESH).create("tmp", FRAME);
        })
        .unwrap();
    let log = Log::default();
    let _watches = watch_all(&project, &log);
    project
        .transact("move", |tx| {
            tx.rename("tmp", "models");
        })
        .unwrap();
    assert!(project.resolve("models", &FRAME).is_some());
    assert!(project.resolve("models/foo", &MESH).is_some());
    assert_eq!(log.take(), ["-tmp", "+models", "!move"]);

    project.undo().unwrap();
    assert!(project.resolve("tmp", &FRAME).is_some());
    assert!(project.resolve_any("models").is_none());
    assert!(project.resolve("models/foo", &MESH).is_some());
    assert_eq!(log.take(), ["-models", "+tmp", "!move"]);
    project.redo().unwrap();
    assert_eq!(project.snapshot().len(), 2);
    assert!(project.resolve("models", &FRAME).is_some());
}

#[test]
fn disappearances_come_first() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("one", MESH).create("two", MESH).create("three", MESH);
        })
        .unwrap();
    let log = Log::default();
    let watches = watch_all(&project, &log);
    project
        .transact("swap", |tx| {
            tx.create("four", FRAME)
                .destroy("one")
                .destroy("two")
                .set_field("three", "colors", 1i64)
                .destroy("three");
        })
        .unwrap();
    assert_eq!(
        log.take(),
        ["-one", "-two", "-three", "+four", "!swap"],
        "field changes of destroyed assets are not reported"
    );
    drop(watches);
    project.undo().unwrap();
    assert!(log.take().is_empty());
}

#[test]
fn batch_order_follows_ops() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("a", MESH)
                .set_field("a", "z", 1i64)
                .set_field("a", "y", 1i64)
                .create("b", MESH);
        })
        .unwrap();
    let log = Log::default();
    let _watches = watch_all(&project, &log);

    project
        .transact("edit", |tx| {
            tx.create("c", MESH)
                .set_field("b", "x", 1i64)
                .set_field("a", "y", 2i64)
                .set_field("a", "z", 2i64)
                .create("b/c", MESH);
        })
        .unwrap();
    assert_eq!(log.take(), ["+c", "+b/c", "~b.x", "~a.y", "~a.z", "!edit"]);

    // Undo reports the same changes in reverse.
    project.undo().unwrap();
    assert_eq!(log.take(), ["-b/c", "-c", "~a.z", "~a.y", "~b.x", "!edit"]);
}

#[test]
fn net_diff_collapses_steps() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("kept", MESH).set_field("kept", "colors", 1i64);
        })
        .unwrap();
    let log = Log::default();
    let _watches = watch_all(&project, &log);

    project
        .transact("churn", |tx| {
            tx.create("tmp", MESH)
                .rename("tmp", "final")
                .set_field("kept", "colors", 2i64)
                .set_field("kept", "colors", 1i64)
                .destroy("kept")
                .create("kept", MESH)
                .set_field("kept", "colors", 1i64);
        })
        .unwrap();
    // "kept" ends up identical to how it started.
    assert_eq!(log.take(), ["+final", "!churn"]);

    project
        .transact("replace", |tx| {
            tx.destroy("kept").create("kept", FRAME);
        })
        .unwrap();
    assert_eq!(log.take(), ["-kept", "+kept", "!replace"]);
}

#[test]
fn field_events_carry_values() {
    let project = Project::new();
    project
        .transact("create", |tx| {
            tx.create("m", MESH).set_field("m", "colors", 1i64);
        })
        .unwrap();
    let seen: Arc<parking_lot::Mutex<Vec<FieldChanged>>> = Arc::default();
    let _colors = project.subscribe_field("colors", {
        let seen = seen.clone();
        move |e| seen.lock().push(e.clone())
    });
    project
        .transact("edit", |tx| {
            tx.set_field("m", "colors", 2i64).set_field("m", "other", true);
        })
        .unwrap();
    project
        .transact("clear", |tx| {
            tx.clear_field("m", "colors");
        })
        .unwrap();
    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].kind, MESH);
    assert_eq!(seen[0].old, Some(Value::Int(1)));
    assert_eq!(seen[0].new, Some(Value::Int(2)));
    assert_eq!(seen[1].new, None);
}

#[test]
fn reentrant_changes_rejected() {
    let project = Project::new();
    let results: Arc<parking_lot::Mutex<Vec<String>>> = Arc::default();
    let _watch = project.subscribe_appear({
        let project = project.downgrade();
        let results = results.clone();
        move |e| {
            let Some(project) = project.upgrade() else {
                return;
            };
            // Reading is fine and sees the finished change.
            assert!(project.resolve_any(&e.path).is_some());
            let commit = project.transact("nested", |tx| {
                tx.destroy(&e.path);
            });
            let undo = project.undo();
            results.lock().push(format!("{commit:?} {undo:?}"));
        }
    });
    project
        .transact("outer", |tx| {
            tx.create("m", MESH);
        })
        .unwrap();
    assert_eq!(*results.lock(), ["Err(Reentrant) Err(Reentrant)"]);
    assert!(project.resolve("m", &MESH).is_some());
    assert_eq!(project.history().len(), 1);
    // No longer busy once delivery is over.
    project
        .transact("after", |tx| {
            tx.destroy("m");
        })
        .unwrap();
}

#[test]
fn watch_released_mid_batch() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("a", MESH).create("b", MESH);
        })
        .unwrap();
    let victim: Arc<parking_lot::Mutex<Option<Watch>>> = Arc::default();
    // Subscribed first, so it runs first for every event.
    let _killer = project.subscribe_disappear({
        let victim = victim.clone();
        move |_| {
            victim.lock().take();
        }
    });
    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    *victim.lock() = Some(project.subscribe_disappear({
        let count = count.clone();
        move |_| {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }));
    project
        .transact("destroy both", |tx| {
            tx.destroy("a").destroy("b");
        })
        .unwrap();
    assert!(victim.lock().is_none());
    assert_eq!(count.load(Ordering::Relaxed), 0);
}

#[test]
fn unrecorded_changes_break_history() {
    let project = Project::new();
    project
        .transact("create", |tx| {
            tx.create("m", MESH).set_field("m", "colors", 1i64);
        })
        .unwrap();
    let mut sneaky = project.build_transaction("load");
    sneaky.set_field("m", "colors", 7i64);
    project.apply(&sneaky).unwrap();
    assert_eq!(project.history().len(), 1);
    let before = project.snapshot();

    let err = project.undo().unwrap_err();
    assert!(
        matches!(&err, HistoryError::Inconsistent { description, source: CommandError::MismatchedState(p) }
            if &**description == "create" && *p == path("m")),
        "{err:?}"
    );
    // Nothing moved.
    assert_eq!(project.snapshot(), before);
    assert_eq!(project.history().cursor(), 1);
}

#[test]
fn history_limit() {
    let project = Project::with_options(ProjectOptions {
        history_limit: NonZeroUsize::new(2),
        ..Default::default()
    });
    for name in ["a", "b", "c"] {
        project
            .transact(name, |tx| {
                tx.create(name, MESH);
            })
            .unwrap();
    }
    assert_eq!(project.undo(), Ok(true));
    assert_eq!(project.undo(), Ok(true));
    assert_eq!(project.undo(), Ok(false));
    // The oldest step can no longer be undone.
    assert!(project.resolve("a", &MESH).is_some());
    assert!(project.resolve("b", &MESH).is_none());
    project.clear_history();
    assert_eq!(project.redo(), Ok(false));
}

#[test]
fn strict_registry() {
    let registry = KindRegistry::new().with(
        KindSchema::new(MESH, "a mesh")
            .field("colors", ValueType::Int)
            .field("name", ValueType::Text),
    );
    let project = Project::with_options(ProjectOptions {
        registry: Some(Arc::new(registry)),
        ..Default::default()
    });
    assert_eq!(
        project.transact("unknown kind", |tx| {
            tx.create("f", FRAME);
        }),
        Err(ApplyError::Schema(SchemaError::UnknownKind(FRAME)))
    );
    assert!(matches!(
        project.transact("unknown field", |tx| {
            tx.create("m", MESH).set_field("m", "nope", 1i64);
        }),
        Err(ApplyError::Schema(SchemaError::UnknownField { .. }))
    ));
    assert!(matches!(
        project.transact("wrong type", |tx| {
            tx.create("m", MESH).set_field("m", "colors", "three");
        }),
        Err(ApplyError::Schema(SchemaError::FieldType {
            expected: ValueType::Int,
            found: ValueType::Text,
            ..
        }))
    ));
    project
        .transact("fine", |tx| {
            tx.create("m", MESH)
                .set_field("m", "colors", 3i64)
                .clear_field("m", "name");
        })
        .unwrap();
    assert!(project.snapshot().get(&path("m")).is_some());
}

#[test]
fn enumerate_is_a_snapshot() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("testbox/anim", MESH)
                .create("testbox/anim/0000", FRAME)
                .create("testbox/anim/0001", FRAME)
                .create("testbox/animals", MESH)
                .create("testbox/mesh", MESH);
        })
        .unwrap();
    let listing = project.enumerate("testbox/anim").unwrap();
    project
        .transact("more", |tx| {
            tx.create("testbox/anim/0002", FRAME);
        })
        .unwrap();
    let paths = |listing: &Listing| -> Vec<String> {
        listing.iter().map(|view| view.path().to_string()).collect()
    };
    let expected = ["testbox/anim", "testbox/anim/0000", "testbox/anim/0001"];
    assert_eq!(paths(&listing), expected);
    // Restartable
    assert_eq!(paths(&listing), expected);
    assert_eq!(project.enumerate("testbox/anim").unwrap().iter().count(), 4);

    let children: Vec<_> = project
        .children(Some(&path("testbox")))
        .into_iter()
        .map(|p| p.name().to_owned())
        .collect();
    assert_eq!(children, ["anim", "animals", "mesh"]);
    assert_eq!(project.children(None), [path("testbox")]);
    assert!(project.enumerate("a//b").is_err());
}

#[test]
fn destroy_keeps_children() {
    let project = Project::new();
    project
        .transact("setup", |tx| {
            tx.create("page", MESH).create("page/next", MESH);
        })
        .unwrap();
    // Replace a slot with its own child, in one step.
    project
        .transact("promote", |tx| {
            tx.destroy("page").rename("page/next", "page");
        })
        .unwrap();
    assert!(project.resolve("page", &MESH).is_some());
    assert_eq!(project.snapshot().len(), 1);

    project
        .transact("tree", |tx| {
            tx.create("page/a", MESH).create("page/a/b", MESH);
        })
        .unwrap();
    project
        .transact("clean", |tx| {
            tx.destroy_tree("page");
        })
        .unwrap();
    assert!(project.snapshot().is_empty());
    project.undo().unwrap();
    assert_eq!(project.snapshot().len(), 3);
}

#[test]
fn history_events() {
    let project = Project::new();
    let events: Arc<parking_lot::Mutex<Vec<HistoryEvent>>> = Arc::default();
    let _watch = project.subscribe_history({
        let events = events.clone();
        move |e| events.lock().push(e.clone())
    });
    project
        .transact("one", |tx| {
            tx.create("a", MESH);
        })
        .unwrap();
    project.undo().unwrap();
    project.redo().unwrap();
    let mut loader = project.build_transaction("load");
    loader.create("b", MESH);
    project.apply(&loader).unwrap();
    let events = events.lock();
    assert_eq!(
        *events,
        [
            HistoryEvent::Committed {
                description: "one".into(),
                revision: 1
            },
            HistoryEvent::Undone {
                description: "one".into(),
                revision: 2
            },
            HistoryEvent::Redone {
                description: "one".into(),
                revision: 3
            },
        ]
    );
    assert_eq!(project.revision(), 4);
}
