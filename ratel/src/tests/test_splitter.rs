use super::{carries_marker, definition_names, parse, MPC_CONTRACT};
use crate::splitter::split;
use pretty_assertions::assert_eq;
use ratel_parser::{parse_to_ast, ClassKind, Statement, StatementKind};

#[test]
fn test_no_markers_leaves_the_module_alone() {
    let original = parse("def f():\n    pass\n");
    let result = split(original.clone());

    assert!(!result.has_secondary());
    assert_eq!(result.secondary.to_string(), "");
    assert_eq!(result.primary, original);
    assert_eq!(result.primary.to_string(), "def f():\n    pass\n");
}

#[test]
fn test_tagged_definition_moves_to_the_secondary_tree() {
    let original = parse(
        "@external\ndef keep():\n    pass\n\n@mpc\ndef move(a, b):\n    return a + b\n",
    );
    let result = split(original.clone());

    assert_eq!(result.primary.body, vec![original.body[0].clone()]);
    assert_eq!(
        result.secondary.to_string(),
        "def move(a, b):\n    return a + b\n"
    );
    assert_eq!(
        result.primary.to_string(),
        "@external\ndef keep():\n    pass\n"
    );
}

#[test]
fn test_encounter_order_and_async_definitions() {
    let source = "@mpc\nasync def first():\n    pass\n\n\
                  def middle():\n    pass\n\n\
                  @mpc\ndef second():\n    pass\n\n\
                  def last():\n    pass\n";
    let result = split(parse(source));

    assert_eq!(definition_names(&result.secondary), vec!["first", "second"]);
    assert_eq!(definition_names(&result.primary), vec!["middle", "last"]);
    match &result.secondary.body[0].kind {
        StatementKind::FunctionDef(def) => {
            assert!(def.is_async);
            assert!(def.decorator_list.is_empty());
        }
        other => panic!("expected a function, got {:?}", other),
    }
}

#[test]
fn test_other_decorators_survive() {
    let source = "@external\n@mpc\n@nonreentrant(\"lock\")\n@mpc\ndef f():\n    pass\n";
    let result = split(parse(source));
    assert!(result.primary.body.is_empty());
    assert_eq!(
        result.secondary.to_string(),
        "@external\n@nonreentrant(\"lock\")\ndef f():\n    pass\n"
    );
}

#[test]
fn test_only_bare_identifiers_are_markers() {
    let source = "@mpc()\ndef called():\n    pass\n\n@lib.mpc\ndef dotted():\n    pass\n\n@MPC\ndef shouted():\n    pass\n";
    let original = parse(source);
    let result = split(original.clone());
    assert!(!result.has_secondary());
    assert_eq!(result.primary, original);
}

#[test]
fn test_nested_marker_is_hoisted() {
    let source = "def outer():\n    @mpc\n    def inner():\n        return 1\n\n@mpc\ndef after():\n    pass\n";
    let result = split(parse(source));

    assert_eq!(definition_names(&result.secondary), vec!["inner", "after"]);
    match &result.primary.body[0].kind {
        StatementKind::FunctionDef(def) => assert_eq!(def.body, vec![Statement::pass()]),
        other => panic!("expected a function, got {:?}", other),
    }
    assert_eq!(
        result.secondary.to_string(),
        "def inner():\n    return 1\n\ndef after():\n    pass\n"
    );
}

#[test]
fn test_hoisting_keeps_remaining_statements() {
    let source = "def outer():\n    x = 1\n    @mpc\n    def inner():\n        pass\n    return x\n";
    let result = split(parse(source));
    assert_eq!(
        result.primary.to_string(),
        "def outer():\n    x = 1\n    return x\n"
    );
}

#[test]
fn test_markers_inside_a_tagged_definition_are_stripped_in_place() {
    let source = "@mpc\nasync def prog(ctx):\n    @mpc\n    def helper(x):\n        return x\n    return helper(ctx)\n";
    let result = split(parse(source));

    assert!(result.primary.body.is_empty());
    assert_eq!(definition_names(&result.secondary), vec!["prog"]);
    assert!(!carries_marker(&result.secondary.body));
    assert_eq!(
        result.secondary.to_string(),
        "async def prog(ctx):\n    def helper(x):\n        return x\n    return helper(ctx)\n"
    );
}

#[test]
fn test_markers_under_conditionals() {
    let source = "if True:\n    @mpc\n    def f():\n        pass\nelse:\n    x = 1\n";
    let result = split(parse(source));
    assert_eq!(definition_names(&result.secondary), vec!["f"]);
    assert_eq!(result.primary.to_string(), "if True:\n    pass\nelse:\n    x = 1\n");
}

#[test]
fn test_tagged_classes_keep_their_kind() {
    let source = "struct Point:\n    x: uint256\n\n@mpc\nstruct Share:\n    value: uint256\n";
    let result = split(parse(source));

    assert_eq!(definition_names(&result.primary), vec!["Point"]);
    assert_eq!(definition_names(&result.secondary), vec!["Share"]);
    match &result.secondary.body[0].kind {
        StatementKind::ClassDef(def) => assert_eq!(def.kind, ClassKind::Struct),
        other => panic!("expected a class, got {:?}", other),
    }
    assert_eq!(
        result.secondary.to_string(),
        "struct Share:\n    value: uint256\n"
    );
}

#[test]
fn test_source_id_is_carried_to_both_trees() {
    let result = split(parse_to_ast(MPC_CONTRACT, 7).unwrap());
    assert_eq!(result.primary.source_id, 7);
    assert_eq!(result.secondary.source_id, 7);
}

#[test]
fn test_split_is_complete_and_pure() {
    let original = parse(MPC_CONTRACT);
    let result = split(original.clone());

    let tagged: Vec<&Statement> = original
        .body
        .iter()
        .filter(|stmt| carries_marker(std::slice::from_ref(*stmt)))
        .collect();
    let untagged: Vec<Statement> = original
        .body
        .iter()
        .filter(|stmt| !carries_marker(std::slice::from_ref(*stmt)))
        .cloned()
        .collect();

    assert_eq!(result.secondary.body.len(), tagged.len());
    assert_eq!(result.primary.body, untagged);
    assert!(!carries_marker(&result.primary.body));
    assert!(!carries_marker(&result.secondary.body));
    assert_eq!(definition_names(&result.secondary), vec!["multiply", "prog"]);
}

#[test]
fn test_markers_under_try_and_with() {
    let source = "try:\n    @mpc\n    def a():\n        pass\nexcept:\n    @mpc\n    def b():\n        pass\n\
                  else:\n    @mpc\n    def c():\n        pass\nfinally:\n    x = 1\n\n\
                  with lock:\n    @mpc\n    def d():\n        pass\n";
    let result = split(parse(source));

    assert_eq!(definition_names(&result.secondary), vec!["a", "b", "c", "d"]);
    assert!(!carries_marker(&result.primary.body));
    assert_eq!(
        result.primary.to_string(),
        "try:\n    pass\nexcept:\n    pass\nfinally:\n    x = 1\nwith lock:\n    pass\n"
    );
}

#[test]
fn test_python_bodies_split_cleanly() {
    let source = "@mpc\nasync def prog(ctx, *shares):\n    \
                  opened = [await s.open() for s in shares]\n    \
                  try:\n        best = max(opened) if opened else 0\n    \
                  except ValueError:\n        best = 0\n    \
                  async with ctx.lock() as held:\n        \
                  return held.send(opened[1:], **ctx.options)\n";
    let result = split(parse(source));

    assert!(result.primary.body.is_empty());
    let secondary = result.secondary.to_string();
    assert_eq!(
        secondary,
        "async def prog(ctx, *shares):\n    \
         opened = [await s.open() for s in shares]\n    \
         try:\n        best = max(opened) if opened else 0\n    \
         except ValueError:\n        best = 0\n    \
         async with ctx.lock() as held:\n        \
         return held.send(opened[1:], **ctx.options)\n"
    );
    assert_eq!(parse(&secondary).to_string(), secondary);
}
