//! Builtin commands: `set`, `unset`, `list`, `llength`, `lindex`, `lappend`,
//! `rename` and `catch`.

use std::rc::Rc;

use crate::error::TclError;
use crate::interp::Interp;
use crate::obj::Obj;

pub(crate) fn install(interp: &Interp) {
    interp.create_command("set", Rc::new(cmd_set));
    interp.create_command("unset", Rc::new(cmd_unset));
    interp.create_command("list", Rc::new(cmd_list));
    interp.create_command("llength", Rc::new(cmd_llength));
    interp.create_command("lindex", Rc::new(cmd_lindex));
    interp.create_command("lappend", Rc::new(cmd_lappend));
    interp.create_command("rename", Rc::new(cmd_rename));
    interp.create_command("catch", Rc::new(cmd_catch));
}

fn cmd_set(interp: &Interp, objv: &[Obj]) -> Result<Obj, TclError> {
    match objv {
        [_, name] => interp.get_var(&name.as_rc_str()),
        [_, name, value] => Ok(interp.set_var(&name.as_rc_str(), value.clone())),
        _ => Err(TclError::wrong_args("set varName ?newValue?")),
    }
}

fn cmd_unset(interp: &Interp, objv: &[Obj]) -> Result<Obj, TclError> {
    for name in &objv[1..] {
        interp.unset_var(&name.as_rc_str())?;
    }
    Ok(Obj::new())
}

fn cmd_list(_interp: &Interp, objv: &[Obj]) -> Result<Obj, TclError> {
    Ok(Obj::from_list(objv[1..].to_vec()))
}

fn cmd_llength(_interp: &Interp, objv: &[Obj]) -> Result<Obj, TclError> {
    let [_, list] = objv else {
        return Err(TclError::wrong_args("llength list"));
    };
    Ok(Obj::from_int(list.list_len()? as i64))
}

fn cmd_lindex(_interp: &Interp, objv: &[Obj]) -> Result<Obj, TclError> {
    match objv {
        [_, list] => Ok(list.clone()),
        [_, list, index] => {
            let len = list.list_len()?;
            let Some(index) = resolve_index(&index.as_rc_str(), len) else {
                return Err(TclError::script(format!(
                    "bad index \"{index}\": must be integer?[+-]integer? or end?[+-]integer?"
                )));
            };
            match index {
                Some(i) => Ok(list.list_index(i)?.unwrap_or_default()),
                None => Ok(Obj::new()),
            }
        }
        _ => Err(TclError::wrong_args("lindex list ?index?")),
    }
}

/// `Some(None)` is a well-formed index outside the list.
fn resolve_index(text: &str, len: usize) -> Option<Option<usize>> {
    let text = text.trim();
    let (base, offset) = if let Some(rest) = text.strip_prefix("end") {
        let offset = if rest.is_empty() { 0 } else { rest.parse::<i64>().ok()? };
        (len as i64 - 1, offset)
    } else {
        (0, text.parse::<i64>().ok()?)
    };
    let Some(index) = base.checked_add(offset) else {
        return Some(None);
    };
    if index < 0 || index >= len as i64 {
        return Some(None);
    }
    Some(Some(index as usize))
}

fn cmd_lappend(interp: &Interp, objv: &[Obj]) -> Result<Obj, TclError> {
    let Some(name) = objv.get(1) else {
        return Err(TclError::wrong_args("lappend varName ?value ...?"));
    };
    let name = name.as_rc_str();
    let current = interp.take_var(&name).unwrap_or_default();
    // other holders keep the old value
    let target = if current.is_shared() {
        match current.duplicate() {
            Ok(copy) => copy,
            Err(err) => {
                interp.set_var(&name, current);
                return Err(err.into());
            }
        }
    } else {
        current.clone()
    };
    drop(current);

    for value in &objv[2..] {
        if let Err(err) = target.list_append(value.clone()) {
            interp.set_var(&name, target);
            return Err(err.into());
        }
    }
    Ok(interp.set_var(&name, target))
}

fn cmd_rename(interp: &Interp, objv: &[Obj]) -> Result<Obj, TclError> {
    let [_, old, new] = objv else {
        return Err(TclError::wrong_args("rename oldName newName"));
    };
    interp.rename_command(&old.as_rc_str(), &new.as_rc_str())?;
    Ok(Obj::new())
}

fn cmd_catch(interp: &Interp, objv: &[Obj]) -> Result<Obj, TclError> {
    let (script, var) = match objv {
        [_, script] => (script, None),
        [_, script, var] => (script, Some(var)),
        _ => return Err(TclError::wrong_args("catch script ?resultVarName?")),
    };
    let (code, value) = match interp.eval(&script.as_rc_str()) {
        Ok(value) => (0, value),
        Err(err) => (1, Obj::from(err.to_string())),
    };
    if let Some(var) = var {
        interp.set_var(&var.as_rc_str(), value);
    }
    Ok(Obj::from_int(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_read() {
        let interp = Interp::new();
        assert_eq!(interp.eval("set x 4").unwrap().as_string(), "4");
        assert_eq!(interp.eval("set x").unwrap().as_string(), "4");
        let err = interp.eval("set").unwrap_err();
        assert!(err.to_string().starts_with("wrong # args"));
    }

    #[test]
    fn list_commands() {
        let interp = Interp::new();
        interp.eval("set l [list a {b c} d]").unwrap();
        assert_eq!(interp.eval("llength $l").unwrap().get_int().unwrap(), 3);
        assert_eq!(interp.eval("lindex $l 1").unwrap().as_string(), "b c");
        assert_eq!(interp.eval("lindex $l end").unwrap().as_string(), "d");
        assert_eq!(interp.eval("lindex $l end-2").unwrap().as_string(), "a");
        assert_eq!(interp.eval("lindex $l 9").unwrap().as_string(), "");
        assert!(interp.eval("lindex $l x").is_err());
    }

    #[test]
    fn lindex_far_offsets_are_out_of_range() {
        let interp = Interp::new();
        let big = i64::MAX;
        let script = format!("lindex {{a b}} end+{big}");
        assert_eq!(interp.eval(&script).unwrap().as_string(), "");
        let script = format!("lindex {{a b}} end-{big}");
        assert_eq!(interp.eval(&script).unwrap().as_string(), "");
        assert_eq!(resolve_index("end+9223372036854775807", 2), Some(None));
    }

    #[test]
    fn lappend_copies_shared_values() {
        let interp = Interp::new();
        interp.eval("set a {1 2}; set b $a").unwrap();
        interp.eval("lappend b 3").unwrap();
        assert_eq!(interp.get_var("a").unwrap().as_string(), "1 2");
        assert_eq!(interp.get_var("b").unwrap().as_string(), "1 2 3");
        interp.eval("lappend fresh x").unwrap();
        assert_eq!(interp.get_var("fresh").unwrap().as_string(), "x");
    }

    #[test]
    fn catch_reports_errors() {
        let interp = Interp::new();
        assert_eq!(interp.eval("catch {nope} msg").unwrap().get_int().unwrap(), 1);
        assert_eq!(
            interp.get_var("msg").unwrap().as_string(),
            "no such command \"nope\""
        );
        assert_eq!(interp.eval("catch {set ok 1}").unwrap().get_int().unwrap(), 0);
    }

    #[test]
    fn rename_builtin() {
        let interp = Interp::new();
        interp.eval("rename list mklist").unwrap();
        assert_eq!(interp.eval("mklist a b").unwrap().as_string(), "a b");
        assert!(interp.eval("list a").is_err());
    }
}
