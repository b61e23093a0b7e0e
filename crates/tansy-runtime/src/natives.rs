//! The natives registered at VM startup (§4.7, SPEC_FULL §4.8).
//!
//! Grounded on `original_source/src/ext/functions.c`'s smallest,
//! general-purpose entries: `cc_function_time`, the `cc_function_val_is_*`
//! family (collapsed here into one `type` dispatch rather than one
//! predicate per type), and `cc_function_environment_getvar`. Deliberately
//! excludes the file/process/regex/array/hash surface those sources also
//! register, since that extension surface is out of scope (§1).

use tansy_value::{ErrorKind, NativeContext, NativeFail, NativeResult, Value};

use crate::vm::Vm;

pub(crate) fn register_all(vm: &mut Vm) {
    vm.register_native("clock", clock);
    vm.register_native("type", type_of);
    vm.register_native("getenv", getenv);
}

/// Zero-argument native: wall-clock seconds since `UNIX_EPOCH`, mirroring
/// `cc_function_time`'s `gettimeofday`-based reading.
fn clock(_ctx: &mut dyn NativeContext, _args: &[Value]) -> NativeResult {
    let elapsed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Ok(Value::Number(elapsed.as_secs_f64()))
}

/// One-argument, type-checked native: returns the name of `value`'s type.
/// Exercises the same `FE_ARG_COUNT_1` path the `val_is_*` family raises
/// on misuse, collapsed into a single dispatch rather than one predicate
/// per type.
fn type_of(ctx: &mut dyn NativeContext, args: &[Value]) -> NativeResult {
    if args.len() != 1 {
        return Err(NativeFail::new(ErrorKind::ArgCount1));
    }
    let name = ctx.heap().type_name(args[0]);
    Ok(Value::Obj(ctx.intern_string(name.as_bytes().to_vec())))
}

/// One-argument native reading an environment variable, grounded directly
/// on `cc_function_environment_getvar`: returns the value as a string, or
/// `false` if the variable is unset.
fn getenv(ctx: &mut dyn NativeContext, args: &[Value]) -> NativeResult {
    if args.len() != 1 {
        return Err(NativeFail::new(ErrorKind::ArgCount1));
    }
    let Some(obj_ref) = args[0].as_obj() else {
        return Err(NativeFail::new(ErrorKind::ArgTypeString));
    };
    let Some(string) = ctx.heap().get(obj_ref).as_string() else {
        return Err(NativeFail::new(ErrorKind::ArgTypeString));
    };
    let name = string.as_str_lossy().into_owned();
    match std::env::var(&name) {
        Ok(value) => Ok(Value::Obj(ctx.intern_string(value.into_bytes()))),
        Err(_) => Ok(Value::Bool(false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Vm;

    #[test]
    fn clock_takes_no_arguments_and_returns_a_number() {
        let mut vm = Vm::new();
        let result = clock(&mut vm, &[]).unwrap();
        assert!(result.is_number());
    }

    #[test]
    fn type_rejects_wrong_argument_count() {
        let mut vm = Vm::new();
        let err = type_of(&mut vm, &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgCount1);
    }

    #[test]
    fn type_of_number_is_number() {
        let mut vm = Vm::new();
        let result = type_of(&mut vm, &[Value::Number(1.0)]).unwrap();
        let obj_ref = result.as_obj().unwrap();
        assert_eq!(vm.heap().get(obj_ref).as_string().unwrap().as_bytes(), b"number");
    }

    #[test]
    fn getenv_missing_variable_returns_false() {
        let mut vm = Vm::new();
        let name_ref = vm.intern_string(b"TANSY_DEFINITELY_UNSET_VAR".to_vec());
        let result = getenv(&mut vm, &[Value::Obj(name_ref)]).unwrap();
        assert_eq!(result, Value::Bool(false));
    }
}
