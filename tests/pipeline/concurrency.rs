//! One engine shared between threads

use std::sync::Arc;
use std::thread;

use crate::common::*;
use attrflow::Value;

#[test]
fn test_parallel_saves_of_distinct_objects() {
    let (directory, engine) = engine(&[USER, GROUP]);
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut user = engine.create("User").unwrap();
                engine
                    .set(&mut user, "uid", strings(&[&format!("user{}", i)]))
                    .unwrap();
                engine
                    .set(&mut user, "uidNumber", vec![Value::Int(1000 + i)])
                    .unwrap();
                engine.save(&mut user, None).unwrap()
            })
        })
        .collect();

    let uuids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(directory.len(), 8);
    for (i, uuid) in uuids.iter().enumerate() {
        let user = engine.load("User", uuid).unwrap();
        assert_eq!(user.get("uidNumber").unwrap(), &[Value::Int(1000 + i as i64)]);
    }
}
