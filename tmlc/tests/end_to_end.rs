//! End-to-end scenarios grounded in the spec's testable-properties section:
//! drive the full `driver::compile` pipeline over small source snippets and
//! assert on IR fragments the lowering rules guarantee.

use tmlc::driver::{compile, CompilationInput, CompilerOptions};

fn compile_ok(source: &str) -> String {
    let input = CompilationInput::Text { path: "t.tml".to_string(), source: source.to_string() };
    match compile(input, CompilerOptions::default()) {
        Ok(success) => success.ir,
        Err(bag) => panic!("expected successful compile, got {:?}", bag.diagnostics),
    }
}

#[test]
fn empty_module_is_well_formed_but_empty() {
    let ir = compile_ok("");
    assert!(ir.contains("target triple"));
    assert!(ir.contains("!llvm.ident"));
    assert!(!ir.contains("define "));
}

#[test]
fn minimal_main_returns_zero() {
    let ir = compile_ok("func main() -> I32 {\n  0\n}\n");
    assert!(ir.contains("@tml_main"));
    assert!(ir.contains("ret i32 0"));
}

#[test]
fn generic_function_instantiated_per_call_site() {
    let ir = compile_ok(
        "func id[T](x: T) -> T { x }\nfunc main() -> I32 { id[I32](7) }\n",
    );
    assert!(ir.contains("@tml_id__I32"));
}

#[test]
fn struct_field_access_reads_the_correct_slot() {
    let ir = compile_ok(
        "type Point { x: I32, y: I32 }\nfunc main() -> I32 {\n  var p: Point = Point { x: 1, y: 2 }\n  p.y\n}\n",
    );
    assert!(ir.contains("%struct.Point"));
    assert!(ir.contains("getelementptr inbounds %struct.Point"));
}

#[test]
fn enum_variant_pattern_extracts_payload_through_tag_check() {
    let ir = compile_ok(
        "enum Maybe[T] { Just(T), Nothing }\n\
         func unwrap_or_zero(m: Maybe[I32]) -> I32 {\n\
         \x20 when m {\n\
         \x20   Just(x) => x,\n\
         \x20   _ => 0,\n\
         \x20 }\n\
         }\n\
         func main() -> I32 {\n\
         \x20 unwrap_or_zero(Just(42))\n\
         }\n",
    );
    assert!(ir.contains("icmp eq i32"));
    assert!(ir.contains("getelementptr inbounds"));
    assert!(ir.contains("when.merge"));
}

#[test]
fn dyn_behavior_param_boxes_a_concrete_class_and_dispatches_through_its_vtable() {
    let ir = compile_ok(
        "behavior Speak {\n\
         \x20 func greet(this) -> I32;\n\
         }\n\
         class Greeter {\n\
         }\n\
         impl Speak for Greeter {\n\
         \x20 func greet(this) -> I32 { 1 }\n\
         }\n\
         func announce(speaker: dyn Speak) -> I32 {\n\
         \x20 speaker.greet()\n\
         }\n\
         func main() -> I32 {\n\
         \x20 announce(Greeter { })\n\
         }\n",
    );
    assert!(ir.contains("%dyn.Speak = type { ptr, ptr }"));
    assert!(ir.contains("%vtable.Greeter.Speak = type { ptr }"));
    assert!(ir.contains("@vtable.Greeter.Speak = internal constant"));
    assert!(ir.contains("@tml_Greeter_greet"));
    assert!(ir.contains("insertvalue %dyn.Speak"));
    assert!(ir.contains("extractvalue %dyn.Speak"));
}

#[test]
fn mut_this_impl_method_on_a_primitive_target_compiles() {
    let ir = compile_ok(
        "impl I32 {\n\
         \x20 func reset(mut this) {\n\
         \x20   let y: I32 = 0\n\
         \x20 }\n\
         }\n\
         func main() -> I32 {\n\
         \x20 var x: I32 = 5\n\
         \x20 x.reset()\n\
         \x20 0\n\
         }\n",
    );
    assert!(ir.contains("define void @tml_I32_reset(ptr %this)"));
    assert!(ir.contains("call void @tml_I32_reset("));
}

#[test]
fn parse_error_reports_structured_diagnostic_not_partial_ir() {
    let input = CompilationInput::Text { path: "broken.tml".to_string(), source: "func main( -> I32 { 0 }\n".to_string() };
    let result = compile(input, CompilerOptions::default());
    let bag = result.expect_err("malformed source must not produce IR");
    assert!(!bag.diagnostics.is_empty());
}
