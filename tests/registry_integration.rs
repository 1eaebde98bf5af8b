//! Object identity, registration races and lifecycle notifications.

mod common;

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use sda_core::context::ContextCallbacks;
use sda_core::core::data_type::DataType;
use sda_core::core::id::IdGenerator;
use sda_core::core::object::{ContextObject, Object};
use sda_core::core::symbol::{Symbol, SymbolKind};
use sda_core::image::Image;
use sda_core::symbol_table::SymbolTable;
use sda_core::SdaError;

use common::{context, text_image};

#[derive(Default)]
struct Log(Mutex<Vec<String>>);

impl ContextCallbacks for Log {
    fn on_object_added(&self, object: &dyn Object) {
        self.0.lock().unwrap().push(format!("added {}", object.class_name()));
    }

    fn on_object_changed(&self, object: &dyn Object) {
        self.0.lock().unwrap().push(format!("changed {}", object.class_name()));
    }

    fn on_object_removed(&self, object: &dyn Object) {
        self.0.lock().unwrap().push(format!("removed {}", object.class_name()));
    }
}

#[test]
fn lookup_by_hash_id() {
    let ctx = context();
    let image = ctx
        .create_image_from_bytes("hello.exe", "PE", &text_image())
        .unwrap();

    let found = ctx.registry().get_as::<Image>(image.hash_id()).unwrap();
    assert!(Arc::ptr_eq(&found, &image));

    let table = image.global_symbol_table();
    assert!(matches!(
        ctx.registry().get_as::<Image>(table.hash_id()),
        Err(SdaError::WrongClass { .. })
    ));
    assert_eq!(ctx.get(table.hash_id()).unwrap().class_name(), "SymbolTable");
}

#[test]
fn rename_keeps_hash_id() {
    let ctx = context();
    let log = Arc::new(Log::default());
    let void = DataType::void(&ctx);
    let sym = Symbol::new(&ctx, SymbolKind::Function, "sub_1000", void);
    ctx.callbacks().subscribe(log.clone());

    let before = sym.hash_id();
    sym.set_name("main");
    sym.set_comment("program entry");
    assert_eq!(sym.hash_id(), before);
    assert_eq!(ctx.registry().get_as::<Symbol>(before).unwrap().name(), "main");
    assert_eq!(
        *log.0.lock().unwrap(),
        vec!["changed Symbol".to_string(), "changed Symbol".to_string()]
    );
}

#[test]
fn registration_race_has_one_winner() {
    let ctx = context();
    let id = IdGenerator::object_id();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                SymbolTable::with_id(&ctx, id, &format!("table-{}", i))
            })
        })
        .collect();
    let tables: Vec<Arc<SymbolTable>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for table in &tables[1..] {
        assert!(Arc::ptr_eq(table, &tables[0]));
    }
    assert_eq!(ctx.registry().len(), 1);
}

#[test]
fn dropped_objects_leave_the_index() {
    let ctx = context();
    let hash_id = {
        let table = SymbolTable::new(&ctx, "scratch");
        table.hash_id()
    };
    assert!(matches!(
        ctx.get(hash_id),
        Err(SdaError::NotFound { .. })
    ));
    assert!(ctx.registry().is_empty());
}

#[test]
fn temporary_objects_are_excluded_until_promoted() {
    let ctx = context();
    let table = SymbolTable::new(&ctx, "candidate");
    table.set_temporary(true);
    assert!(ctx.registry().objects().is_empty());
    assert!(ctx.persistent_records().is_empty());
    assert!(ctx.get(table.hash_id()).is_ok());

    table.set_temporary(false);
    assert_eq!(ctx.persistent_records().len(), 1);

    table.set_temporary(true);
    assert!(ctx.discard(table.hash_id()).unwrap());
    assert!(matches!(
        ctx.get(table.hash_id()),
        Err(SdaError::NotFound { .. })
    ));
}

#[test]
fn contexts_are_isolated() {
    let a = context();
    let b = context();
    let table = SymbolTable::new(&a, "global");
    assert!(a.registry().contains(table.hash_id()));
    assert!(!b.registry().contains(table.hash_id()));
}

#[test]
fn image_lifecycle_notifications() {
    let ctx = context();
    let log = Arc::new(Log::default());
    ctx.callbacks().subscribe(log.clone());

    let image = ctx
        .create_image_from_bytes("hello.exe", "PE", &text_image())
        .unwrap();
    ctx.remove(image.hash_id()).unwrap();

    assert_eq!(
        *log.0.lock().unwrap(),
        vec![
            "added SymbolTable".to_string(),
            "added Image".to_string(),
            "changed Image".to_string(),
            "removed Image".to_string(),
        ]
    );
}
