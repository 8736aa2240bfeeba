//! Extraction, validation and traversal of compiled operation trees.

use strata_lib::op::{Field, FieldKind, OpError, Schema, SchemaRegistry};

use super::common::compile;

#[test]
fn copy_from_local_walks_two_nodes() {
  let registry = SchemaRegistry::builtin();
  let op = compile(r#"return { op = "copy", from = { { op = "local", dir = "foo" } } }"#)
    .op(&registry)
    .unwrap();

  op.validate("#Copy", &registry).unwrap();

  let mut n = 0;
  op.walk(|_| {
    n += 1;
    Ok::<_, OpError>(())
  })
  .unwrap();
  assert_eq!(n, 2);
}

#[test]
fn deepest_invalid_node_is_reported() {
  let registry = SchemaRegistry::builtin();
  let op = compile(
    r#"
      local leaf = { op = "local", dir = "ok", extra = true }
      return { op = "copy", from = { { op = "copy", from = { leaf } } } }
    "#,
  )
  .op(&registry)
  .unwrap();

  match op.validate("#Copy", &registry) {
    Err(OpError::SchemaMismatch { kind, path, reason, .. }) => {
      assert_eq!(kind, "local");
      assert_eq!(path, "$.from[0].from[0]");
      assert!(reason.contains("extra"), "unexpected reason: {}", reason);
    }
    other => panic!("expected a schema mismatch, got {:?}", other),
  }
}

#[test]
fn validation_of_a_valid_tree_succeeds_at_every_depth() {
  let registry = SchemaRegistry::builtin();
  let op = compile(
    r#"return {
      op = "load",
      from = {
        { op = "copy", from = { { op = "local", dir = "a" } }, src = "/x", dest = "/y" },
        { op = "exec", args = { "/bin/true" }, env = { A = "1" }, dir = "/" },
        { op = "mkdir", path = "/z", mode = 493 },
        { op = "write-file", dest = "/z/f", content = "hi" },
      },
    }"#,
  )
  .op(&registry)
  .unwrap();

  op.validate("#Load", &registry).unwrap();
  assert_eq!(op.count(), 6);
}

#[test]
fn user_schemas_extend_the_registry() {
  let mut registry = SchemaRegistry::builtin();
  registry.register(
    Schema::new("#Fetch", "fetch")
      .field(Field::required("url", FieldKind::String))
      .field(Field::optional("then", FieldKind::Op)),
  );

  let op = compile(r#"return { op = "fetch", url = "https://example.com", ["then"] = { op = "local", dir = "d" } }"#)
    .op(&registry)
    .unwrap();
  op.validate("#Fetch", &registry).unwrap();
  assert_eq!(op.count(), 2);

  assert!(matches!(
    op.validate("#Local", &registry),
    Err(OpError::SchemaMismatch { path, .. }) if path == "$"
  ));
}
