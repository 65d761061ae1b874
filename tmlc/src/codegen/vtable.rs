//! Dynamic dispatch (§4.9): a `%vtable.T.B` type per `(class, behavior)`
//! pair actually boxed as `dyn B` somewhere in the program, a matching
//! `@vtable.T.B` constant, and the boxing/call sequences that use it.

use crate::types::TypeEnv;

use super::types::ensure_dyn_type;
use super::Emitter;

/// Declares `%vtable.T.B = type { ptr, ptr, ... }` (one slot per method in
/// the behavior's declaration order) and the constant initializer pointing
/// at `T`'s concrete `@tml_T_method` functions, emitting a default-method
/// thunk first if `T`'s impl omits a method the behavior defaults.
pub fn emit_vtable(emitter: &mut Emitter, class_name: &str, behavior_name: &str) {
    let key = format!("{class_name}.{behavior_name}");
    if !emitter.generated_types.insert(format!("vtable.{key}")) {
        return;
    }
    let Some(behavior) = emitter.env.behaviors.get(behavior_name).cloned() else {
        return;
    };

    let slot_types = vec!["ptr".to_string(); behavior.methods.len()];
    emitter.type_defs.push_str(&format!(
        "%vtable.{key} = type {{ {} }}\n",
        slot_types.join(", ")
    ));

    let mut entries = Vec::new();
    for method in &behavior.methods {
        let owner = class_vtable_owner(emitter.env, class_name, behavior_name, method);
        let fn_name = format!("@tml_{owner}_{method}");
        entries.push(format!("ptr {fn_name}"));
    }
    emitter.globals.push_str(&format!(
        "@vtable.{key} = internal constant %vtable.{key} {{ {} }}\n",
        entries.join(", ")
    ));
}

/// Finds which class in `class_name`'s ancestor chain actually provides
/// `method` for `behavior_name` — the class itself if its own impl has it,
/// else the nearest ancestor, else the behavior's own default method
/// (emitted once per concrete class under a `tml_<Class>_<method>` thunk
/// name generated on demand by the impl-method instantiation path).
fn class_vtable_owner(env: &TypeEnv, class_name: &str, behavior_name: &str, method: &str) -> String {
    if env
        .impls_for(class_name)
        .iter()
        .any(|i| i.trait_name.as_deref() == Some(behavior_name) && i.methods.iter().any(|m| m == method))
    {
        return class_name.to_string();
    }
    if let Some(class) = env.classes.get(class_name) {
        for ancestor in class.ancestors(&env.classes) {
            if env
                .impls_for(&ancestor.name)
                .iter()
                .any(|i| i.trait_name.as_deref() == Some(behavior_name) && i.methods.iter().any(|m| m == method))
            {
                return ancestor.name.clone();
            }
        }
    }
    class_name.to_string()
}

/// Boxes `data_ptr` (already-heap-allocated instance data) with `T`'s
/// vtable for `behavior_name` into a `dyn B` fat-pointer aggregate, and
/// returns the register holding it.
pub fn emit_box_as_dyn(emitter: &mut Emitter, data_ptr: &str, class_name: &str, behavior_name: &str) -> String {
    ensure_dyn_type(emitter, behavior_name);
    emit_vtable(emitter, class_name, behavior_name);
    let dyn_ty = format!("%dyn.{behavior_name}");
    let agg = emitter.fresh_reg();
    let key = format!("{class_name}.{behavior_name}");
    emitter.functions.push_str(&format!(
        "  {agg}.0 = insertvalue {dyn_ty} undef, ptr {data_ptr}, 0\n"
    ));
    emitter.functions.push_str(&format!(
        "  {agg} = insertvalue {dyn_ty} {agg}.0, ptr @vtable.{key}, 1\n"
    ));
    agg
}

/// The 4-step dispatch sequence: load the vtable pointer out of the fat
/// pointer, GEP to the method's slot, load the function pointer, then call
/// it with the data pointer prepended to `args`.
pub fn emit_dispatch_call(
    emitter: &mut Emitter,
    dyn_value: &str,
    behavior_name: &str,
    method: &str,
    args: &[(String, String)],
    ret_llvm: &str,
) -> String {
    let Some(behavior) = emitter.env.behaviors.get(behavior_name).cloned() else {
        return "undef".to_string();
    };
    let Some(slot) = behavior.methods.iter().position(|m| m == method) else {
        return "undef".to_string();
    };
    ensure_dyn_type(emitter, behavior_name);
    let dyn_ty = format!("%dyn.{behavior_name}");

    let data_ptr = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {data_ptr} = extractvalue {dyn_ty} {dyn_value}, 0\n"));
    let vtable_ptr = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {vtable_ptr} = extractvalue {dyn_ty} {dyn_value}, 1\n"));
    let slot_ptr = emitter.fresh_reg();
    emitter.functions.push_str(&format!(
        "  {slot_ptr} = getelementptr inbounds ptr, ptr {vtable_ptr}, i32 {slot}\n"
    ));
    let fn_ptr = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {fn_ptr} = load ptr, ptr {slot_ptr}\n"));

    let mut arg_list = vec![format!("ptr {data_ptr}")];
    arg_list.extend(args.iter().map(|(ty, val)| format!("{ty} {val}")));
    let call_args = arg_list.join(", ");

    if ret_llvm == "void" {
        emitter
            .functions
            .push_str(&format!("  call void {fn_ptr}({call_args})\n"));
        "undef".to_string()
    } else {
        let result = emitter.fresh_reg();
        emitter
            .functions
            .push_str(&format!("  {result} = call {ret_llvm} {fn_ptr}({call_args})\n"));
        result
    }
}
