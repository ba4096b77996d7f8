// Global objects and prototype methods available to every script.

use std::rc::Rc;

use crate::lite::interp::{Completion, ErrorKind, Interp, Throw};
use crate::lite::json;
use crate::lite::number::{parse_float, parse_int, to_int32};
use crate::value::format_number;
use crate::lite::object::{FunctionKind, NativeFn, ObjectKind, ObjectRef, Property, Value, dense_elements};
use crate::napi::PropertyAttribute;

type Builtin = fn(&Interp, &Value, &[Value], bool) -> Completion;

const FROZEN: PropertyAttribute = PropertyAttribute::READ_ONLY.union(PropertyAttribute::DONT_ENUM).union(PropertyAttribute::DONT_DELETE);

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn native(interp: &Interp, name: &str, function: Builtin) -> ObjectRef {
    let function: NativeFn = Rc::new(function);
    interp.new_native_function(name, function)
}

fn method(interp: &Interp, target: &ObjectRef, name: &str, function: Builtin) {
    let function = native(interp, name, function);
    target.borrow_mut().properties.insert(name.to_string(), Property::hidden(Value::Object(function)));
}

fn getter(interp: &Interp, target: &ObjectRef, name: &str, function: Builtin) {
    let function = native(interp, name, function);
    target.borrow_mut().properties.insert(
        name.to_string(),
        Property::Accessor {
            getter: Some(Value::Object(function)),
            setter: None,
            attr: PropertyAttribute::DONT_ENUM,
        },
    );
}

fn constant(target: &ObjectRef, name: &str, value: Value) {
    target.borrow_mut().properties.insert(name.to_string(), Property::Data { value, attr: FROZEN });
}

/// Installs a global constructor linked both ways with `prototype`.
fn constructor(interp: &Interp, name: &str, function: Builtin, prototype: &ObjectRef) -> ObjectRef {
    let ctor = native(interp, name, function);
    constant(&ctor, "prototype", Value::Object(Rc::clone(prototype)));
    prototype
        .borrow_mut()
        .properties
        .insert("constructor".to_string(), Property::hidden(Value::Object(Rc::clone(&ctor))));
    interp
        .global
        .borrow_mut()
        .properties
        .insert(name.to_string(), Property::hidden(Value::Object(Rc::clone(&ctor))));
    ctor
}

pub fn install(interp: &Interp) {
    let global = Rc::clone(&interp.global);
    global
        .borrow_mut()
        .properties
        .insert("globalThis".to_string(), Property::hidden(Value::Object(Rc::clone(&global))));
    constant(&global, "NaN", Value::Number(f64::NAN));
    constant(&global, "Infinity", Value::Number(f64::INFINITY));
    constant(&global, "undefined", Value::Undefined);
    method(interp, &global, "parseInt", global_parse_int);
    method(interp, &global, "parseFloat", global_parse_float);
    method(interp, &global, "isNaN", global_is_nan);
    method(interp, &global, "isFinite", global_is_finite);

    install_object(interp);
    install_function(interp);
    install_array(interp);
    install_string(interp);
    install_number(interp);
    install_errors(interp);
    install_map(interp);
    install_array_buffer(interp);
    install_json(interp);
    install_math(interp);
    log::trace!("builtins installed");
}

fn global_parse_int(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    let text = interp.to_string(&arg(args, 0))?;
    let radix = to_int32(interp.to_number(&arg(args, 1))?);
    Ok(Value::Number(parse_int(&text, u32::try_from(radix).unwrap_or(1))))
}

fn global_parse_float(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    Ok(Value::Number(parse_float(&interp.to_string(&arg(args, 0))?)))
}

fn global_is_nan(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    Ok(Value::Boolean(interp.to_number(&arg(args, 0))?.is_nan()))
}

fn global_is_finite(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    Ok(Value::Boolean(interp.to_number(&arg(args, 0))?.is_finite()))
}

// ---- Object ----

fn install_object(interp: &Interp) {
    let prototype = Rc::clone(&interp.realm.object_prototype);
    let ctor = constructor(interp, "Object", object_ctor, &prototype);
    method(interp, &ctor, "keys", object_keys);
    method(interp, &prototype, "hasOwnProperty", object_has_own_property);
    method(interp, &prototype, "toString", object_to_string);
}

fn object_ctor(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    match arg(args, 0) {
        value @ Value::Object(_) => Ok(value),
        _ => Ok(Value::Object(interp.new_object())),
    }
}

fn object_keys(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    let keys = match arg(args, 0) {
        Value::Object(obj) => interp.own_enumerable_keys(&obj),
        Value::Undefined | Value::Null => return Err(interp.type_error("Cannot convert undefined or null to object")),
        Value::String(s) => (0..s.encode_utf16().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    };
    Ok(interp.new_array(keys.iter().map(|key| Value::string(key)).collect()))
}

fn object_has_own_property(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let key = interp.to_string(&arg(args, 0))?;
    Ok(Value::Boolean(match this {
        Value::Object(obj) => obj.borrow().own_property(&key).is_some(),
        _ => false,
    }))
}

fn object_to_string(_interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    let tag = match this {
        Value::Undefined => "object Undefined",
        Value::Null => "object Null",
        Value::Boolean(_) => "object Boolean",
        Value::Number(_) => "object Number",
        Value::String(_) => "object String",
        Value::Object(_) if this.is_callable() => "object Function",
        Value::Object(obj) => obj.borrow().kind.tag(),
    };
    Ok(Value::string(&format!("[{tag}]")))
}

// ---- Function ----

fn install_function(interp: &Interp) {
    let prototype = Rc::clone(&interp.realm.function_prototype);
    method(interp, &prototype, "call", function_call);
    method(interp, &prototype, "apply", function_apply);
    method(interp, &prototype, "toString", function_to_string);
}

fn function_call(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let rest = args.get(1..).unwrap_or_default();
    interp.call(this, arg(args, 0), rest)
}

fn function_apply(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let arguments = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Object(obj) => match &obj.borrow().kind {
            ObjectKind::Array(elements) => dense_elements(elements),
            _ => Vec::new(),
        },
        _ => return Err(interp.type_error("CreateListFromArrayLike called on non-object")),
    };
    interp.call(this, arg(args, 0), &arguments)
}

fn function_to_string(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    let Value::Object(obj) = this else {
        return Err(interp.type_error("Function.prototype.toString requires that 'this' be a Function"));
    };
    let name = interp.to_string(&interp.get(this, "name")?)?;
    let native = matches!(obj.borrow().kind, ObjectKind::Function(FunctionKind::Native(_)));
    if native {
        Ok(Value::string(&format!("function {name}() {{ [native code] }}")))
    } else {
        Ok(Value::string(&format!("function {name}() {{ ... }}")))
    }
}

// ---- Array ----

fn install_array(interp: &Interp) {
    let prototype = Rc::clone(&interp.realm.array_prototype);
    let ctor = constructor(interp, "Array", array_ctor, &prototype);
    method(interp, &ctor, "isArray", array_is_array);
    method(interp, &prototype, "push", array_push);
    method(interp, &prototype, "pop", array_pop);
    method(interp, &prototype, "join", array_join);
    method(interp, &prototype, "indexOf", array_index_of);
    method(interp, &prototype, "slice", array_slice);
    method(interp, &prototype, "forEach", array_for_each);
    method(interp, &prototype, "map", array_map);
    method(interp, &prototype, "toString", array_to_string);
}

fn this_array(interp: &Interp, this: &Value) -> Result<ObjectRef, Throw> {
    match this {
        Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Array(_)) => Ok(Rc::clone(obj)),
        _ => Err(interp.type_error("receiver is not an array")),
    }
}

fn elements_of(obj: &ObjectRef) -> Vec<Value> {
    match &obj.borrow().kind {
        ObjectKind::Array(elements) => dense_elements(elements),
        _ => Vec::new(),
    }
}

fn element_at(obj: &ObjectRef, index: usize) -> Option<Value> {
    match &obj.borrow().kind {
        ObjectKind::Array(elements) => elements.get(index).map(|slot| slot.clone().unwrap_or_default()),
        _ => None,
    }
}

/// Relative index as taken by `slice`: negative counts from the end, clamped to `0..=len`.
fn relative_index(interp: &Interp, value: &Value, len: usize, default: usize) -> Result<usize, Throw> {
    if matches!(value, Value::Undefined) {
        return Ok(default);
    }
    let n = interp.to_number(value)?;
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let len = len as f64;
    Ok(if n < 0.0 { (len + n).max(0.0) } else { n.min(len) } as usize)
}

fn array_ctor(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    if let [Value::Number(n)] = args {
        if n.fract() != 0.0 || *n < 0.0 || *n > f64::from(u32::MAX) {
            return Err(interp.throw_error(ErrorKind::Range, "Invalid array length"));
        }
        return Ok(interp.new_array(vec![Value::Undefined; *n as usize]));
    }
    Ok(interp.new_array(args.to_vec()))
}

fn array_is_array(_interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    let is_array = matches!(arg(args, 0), Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Array(_)));
    Ok(Value::Boolean(is_array))
}

fn array_push(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_array(interp, this)?;
    let mut data = obj.borrow_mut();
    let ObjectKind::Array(elements) = &mut data.kind else {
        return Ok(Value::Undefined);
    };
    elements.extend(args.iter().cloned().map(Some));
    Ok(Value::Number(elements.len() as f64))
}

fn array_pop(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    let obj = this_array(interp, this)?;
    let popped = match &mut obj.borrow_mut().kind {
        ObjectKind::Array(elements) => elements.pop().flatten(),
        _ => None,
    };
    Ok(popped.unwrap_or_default())
}

fn array_join(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_array(interp, this)?;
    let separator = match arg(args, 0) {
        Value::Undefined => Rc::from(","),
        other => interp.to_string(&other)?,
    };
    let mut parts = Vec::new();
    for element in elements_of(&obj) {
        parts.push(match element {
            Value::Undefined | Value::Null => String::new(),
            other => interp.to_string(&other)?.to_string(),
        });
    }
    Ok(Value::string(&parts.join(&separator)))
}

fn array_to_string(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    array_join(interp, this, &[], false)
}

fn array_index_of(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_array(interp, this)?;
    let needle = arg(args, 0);
    let elements = elements_of(&obj);
    let from = relative_index(interp, &arg(args, 1), elements.len(), 0)?;
    let found = elements.iter().skip(from).position(|element| element.strict_equals(&needle));
    Ok(Value::Number(found.map_or(-1.0, |index| (index + from) as f64)))
}

fn array_slice(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_array(interp, this)?;
    let elements = elements_of(&obj);
    let start = relative_index(interp, &arg(args, 0), elements.len(), 0)?;
    let end = relative_index(interp, &arg(args, 1), elements.len(), elements.len())?;
    Ok(interp.new_array(elements.get(start..end.max(start)).unwrap_or_default().to_vec()))
}

fn array_for_each(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_array(interp, this)?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(interp.type_error(&format!("{callback:?} is not a function")));
    }
    let len = elements_of(&obj).len();
    for index in 0..len {
        let Some(element) = element_at(&obj, index) else {
            break;
        };
        interp.call(&callback, arg(args, 1), &[element, Value::Number(index as f64), this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn array_map(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_array(interp, this)?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(interp.type_error(&format!("{callback:?} is not a function")));
    }
    let len = elements_of(&obj).len();
    let mut mapped = Vec::with_capacity(len);
    for index in 0..len {
        let element = element_at(&obj, index).unwrap_or_default();
        mapped.push(interp.call(&callback, arg(args, 1), &[element, Value::Number(index as f64), this.clone()])?);
    }
    Ok(interp.new_array(mapped))
}

// ---- String, Number, Boolean ----

fn install_string(interp: &Interp) {
    let prototype = Rc::clone(&interp.realm.string_prototype);
    constructor(interp, "String", string_ctor, &prototype);
    method(interp, &prototype, "toString", string_to_string);
    method(interp, &prototype, "toUpperCase", string_to_upper_case);
    method(interp, &prototype, "toLowerCase", string_to_lower_case);
    method(interp, &prototype, "indexOf", string_index_of);
    method(interp, &prototype, "slice", string_slice);
    method(interp, &prototype, "split", string_split);
    method(interp, &prototype, "trim", string_trim);
}

fn this_string(interp: &Interp, this: &Value) -> Result<Rc<str>, Throw> {
    if this.is_nullish() {
        return Err(interp.type_error("String.prototype method called on null or undefined"));
    }
    interp.to_string(this)
}

fn string_ctor(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    match args.first() {
        None => Ok(Value::string("")),
        Some(value) => Ok(Value::String(interp.to_string(value)?)),
    }
}

fn string_to_string(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    Ok(Value::String(this_string(interp, this)?))
}

fn string_to_upper_case(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    Ok(Value::string(&this_string(interp, this)?.to_uppercase()))
}

fn string_to_lower_case(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    Ok(Value::string(&this_string(interp, this)?.to_lowercase()))
}

fn string_trim(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    Ok(Value::string(this_string(interp, this)?.trim()))
}

fn string_index_of(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let haystack: Vec<u16> = this_string(interp, this)?.encode_utf16().collect();
    let needle: Vec<u16> = interp.to_string(&arg(args, 0))?.encode_utf16().collect();
    let from = relative_index(interp, &arg(args, 1), haystack.len(), 0)?;
    if needle.is_empty() {
        return Ok(Value::Number(from as f64));
    }
    let found = haystack
        .get(from..)
        .unwrap_or_default()
        .windows(needle.len())
        .position(|window| window == needle.as_slice());
    Ok(Value::Number(found.map_or(-1.0, |index| (index + from) as f64)))
}

fn string_slice(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let units: Vec<u16> = this_string(interp, this)?.encode_utf16().collect();
    let start = relative_index(interp, &arg(args, 0), units.len(), 0)?;
    let end = relative_index(interp, &arg(args, 1), units.len(), units.len())?;
    let slice = units.get(start..end.max(start)).unwrap_or_default();
    Ok(Value::string(&String::from_utf16_lossy(slice)))
}

fn string_split(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let text = this_string(interp, this)?;
    let parts: Vec<Value> = match arg(args, 0) {
        Value::Undefined => vec![Value::String(text)],
        separator => {
            let separator = interp.to_string(&separator)?;
            if separator.is_empty() {
                text.encode_utf16().map(|unit| Value::string(&String::from_utf16_lossy(&[unit]))).collect()
            } else {
                text.split(&*separator).map(Value::string).collect()
            }
        }
    };
    Ok(interp.new_array(parts))
}

fn install_number(interp: &Interp) {
    let prototype = Rc::clone(&interp.realm.number_prototype);
    let ctor = constructor(interp, "Number", number_ctor, &prototype);
    constant(&ctor, "MAX_SAFE_INTEGER", Value::Number(9_007_199_254_740_991.0));
    method(interp, &ctor, "isInteger", number_is_integer);
    method(interp, &prototype, "toString", number_to_string);
    method(interp, &prototype, "toFixed", number_to_fixed);

    let prototype = Rc::clone(&interp.realm.boolean_prototype);
    constructor(interp, "Boolean", boolean_ctor, &prototype);
    method(interp, &prototype, "toString", boolean_to_string);
}

fn number_ctor(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    match args.first() {
        None => Ok(Value::Number(0.0)),
        Some(value) => Ok(Value::Number(interp.to_number(value)?)),
    }
}

fn number_is_integer(_interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    Ok(Value::Boolean(matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0)))
}

fn this_number(interp: &Interp, this: &Value) -> Result<f64, Throw> {
    match this {
        Value::Number(n) => Ok(*n),
        _ => Err(interp.type_error("Number.prototype method called on a non-number")),
    }
}

fn number_to_string(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let n = this_number(interp, this)?;
    let radix = match arg(args, 0) {
        Value::Undefined => 10,
        value => to_int32(interp.to_number(&value)?),
    };
    if !(2..=36).contains(&radix) {
        return Err(interp.throw_error(ErrorKind::Range, "toString() radix must be between 2 and 36"));
    }
    if radix == 10 || !n.is_finite() {
        return Ok(Value::string(&format_number(n)));
    }
    Ok(Value::string(&format_radix(n, radix as u32)))
}

/// Integer part in `radix`, followed by up to 20 fractional digits.
fn format_radix(n: f64, radix: u32) -> String {
    let mut out = String::new();
    if n < 0.0 {
        out.push('-');
    }
    let abs = n.abs();
    let mut int = abs.trunc();
    let mut digits = Vec::new();
    loop {
        let digit = (int % f64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        int = (int / f64::from(radix)).trunc();
        if int < 1.0 {
            break;
        }
    }
    out.extend(digits.iter().rev());
    let mut fraction = abs.fract();
    if fraction > 0.0 {
        out.push('.');
        for _ in 0..20 {
            fraction *= f64::from(radix);
            let digit = fraction.trunc() as u32;
            out.push(char::from_digit(digit, radix).unwrap_or('0'));
            fraction = fraction.fract();
            if fraction == 0.0 {
                break;
            }
        }
    }
    out
}

fn number_to_fixed(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let n = this_number(interp, this)?;
    let digits = to_int32(interp.to_number(&arg(args, 0))?);
    if !(0..=100).contains(&digits) {
        return Err(interp.throw_error(ErrorKind::Range, "toFixed() digits argument must be between 0 and 100"));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(Value::string(&format_number(n)));
    }
    Ok(Value::string(&format!("{n:.*}", digits as usize)))
}

fn boolean_ctor(_interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    Ok(Value::Boolean(arg(args, 0).truthy()))
}

fn boolean_to_string(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    match this {
        Value::Boolean(b) => Ok(Value::string(if *b { "true" } else { "false" })),
        _ => Err(interp.type_error("Boolean.prototype.toString requires that 'this' be a Boolean")),
    }
}

// ---- Errors ----

fn install_errors(interp: &Interp) {
    let builtins: [(ErrorKind, Builtin); 5] = [
        (ErrorKind::Error, error_ctor),
        (ErrorKind::Type, type_error_ctor),
        (ErrorKind::Range, range_error_ctor),
        (ErrorKind::Syntax, syntax_error_ctor),
        (ErrorKind::Reference, reference_error_ctor),
    ];
    for (kind, function) in builtins {
        let prototype = Rc::clone(interp.realm.error_prototype(kind));
        {
            let mut data = prototype.borrow_mut();
            data.properties.insert("name".to_string(), Property::hidden(Value::string(kind.name())));
            data.properties.insert("message".to_string(), Property::hidden(Value::string("")));
        }
        constructor(interp, kind.name(), function, &prototype);
    }
    method(interp, interp.realm.error_prototype(ErrorKind::Error), "toString", error_to_string);
}

fn make_error(interp: &Interp, kind: ErrorKind, args: &[Value]) -> Completion {
    let message = match arg(args, 0) {
        Value::Undefined => Rc::from(""),
        value => interp.to_string(&value)?,
    };
    Ok(interp.new_error(kind, &message))
}

fn error_ctor(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    make_error(interp, ErrorKind::Error, args)
}

fn type_error_ctor(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    make_error(interp, ErrorKind::Type, args)
}

fn range_error_ctor(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    make_error(interp, ErrorKind::Range, args)
}

fn syntax_error_ctor(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    make_error(interp, ErrorKind::Syntax, args)
}

fn reference_error_ctor(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    make_error(interp, ErrorKind::Reference, args)
}

fn error_to_string(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    if !matches!(this, Value::Object(_)) {
        return Err(interp.type_error("Error.prototype.toString called on non-object"));
    }
    let name = match interp.get(this, "name")? {
        Value::Undefined => Rc::from("Error"),
        value => interp.to_string(&value)?,
    };
    let message = match interp.get(this, "message")? {
        Value::Undefined => Rc::from(""),
        value => interp.to_string(&value)?,
    };
    Ok(Value::string(&match (name.is_empty(), message.is_empty()) {
        (_, true) => name.to_string(),
        (true, false) => message.to_string(),
        (false, false) => format!("{name}: {message}"),
    }))
}

// ---- Map ----

fn install_map(interp: &Interp) {
    let prototype = Rc::clone(&interp.realm.map_prototype);
    constructor(interp, "Map", map_ctor, &prototype);
    method(interp, &prototype, "get", map_get);
    method(interp, &prototype, "set", map_set);
    method(interp, &prototype, "has", map_has);
    method(interp, &prototype, "delete", map_delete);
    method(interp, &prototype, "clear", map_clear);
    method(interp, &prototype, "forEach", map_for_each);
    getter(interp, &prototype, "size", map_size);
}

fn this_map(interp: &Interp, this: &Value) -> Result<ObjectRef, Throw> {
    match this {
        Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Map(_)) => Ok(Rc::clone(obj)),
        _ => Err(interp.type_error("Method Map.prototype called on incompatible receiver")),
    }
}

fn map_entries(obj: &ObjectRef) -> Vec<(Value, Value)> {
    match &obj.borrow().kind {
        ObjectKind::Map(entries) => entries.clone(),
        _ => Vec::new(),
    }
}

/// `-0` and `+0` are the same key.
fn normalize_key(key: Value) -> Value {
    match key {
        Value::Number(n) if n == 0.0 => Value::Number(0.0),
        other => other,
    }
}

pub(crate) fn map_insert(obj: &ObjectRef, key: Value, value: Value) {
    let key = normalize_key(key);
    let previous = match &mut obj.borrow_mut().kind {
        ObjectKind::Map(entries) => match entries.iter_mut().find(|(existing, _)| existing.same_value_zero(&key)) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                entries.push((key, value));
                None
            }
        },
        _ => None,
    };
    drop(previous);
}

fn map_ctor(interp: &Interp, _this: &Value, args: &[Value], construct: bool) -> Completion {
    if !construct {
        return Err(interp.type_error("Constructor Map requires 'new'"));
    }
    let map = interp.new_map(Vec::new());
    let Value::Object(obj) = &map else {
        return Ok(map);
    };
    match arg(args, 0) {
        Value::Undefined | Value::Null => {}
        Value::Object(source) if matches!(source.borrow().kind, ObjectKind::Array(_)) => {
            for entry in elements_of(&source) {
                let Value::Object(pair) = &entry else {
                    return Err(interp.type_error(&format!("Iterator value {entry:?} is not an entry object")));
                };
                let pair = elements_of(pair);
                map_insert(obj, pair.first().cloned().unwrap_or_default(), pair.get(1).cloned().unwrap_or_default());
            }
        }
        Value::Object(source) if matches!(source.borrow().kind, ObjectKind::Map(_)) => {
            for (key, value) in map_entries(&source) {
                map_insert(obj, key, value);
            }
        }
        other => return Err(interp.type_error(&format!("{other:?} is not iterable"))),
    }
    Ok(map)
}

fn map_get(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_map(interp, this)?;
    let key = arg(args, 0);
    let found = map_entries(&obj).into_iter().find(|(existing, _)| existing.same_value_zero(&key));
    Ok(found.map(|(_, value)| value).unwrap_or_default())
}

fn map_set(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_map(interp, this)?;
    map_insert(&obj, arg(args, 0), arg(args, 1));
    Ok(this.clone())
}

fn map_has(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_map(interp, this)?;
    let key = arg(args, 0);
    let found = match &obj.borrow().kind {
        ObjectKind::Map(entries) => entries.iter().any(|(existing, _)| existing.same_value_zero(&key)),
        _ => false,
    };
    Ok(Value::Boolean(found))
}

fn map_delete(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_map(interp, this)?;
    let key = arg(args, 0);
    let removed = match &mut obj.borrow_mut().kind {
        ObjectKind::Map(entries) => entries
            .iter()
            .position(|(existing, _)| existing.same_value_zero(&key))
            .map(|index| entries.remove(index)),
        _ => None,
    };
    Ok(Value::Boolean(removed.is_some()))
}

fn map_clear(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    let obj = this_map(interp, this)?;
    let removed = match &mut obj.borrow_mut().kind {
        ObjectKind::Map(entries) => std::mem::take(entries),
        _ => Vec::new(),
    };
    drop(removed);
    Ok(Value::Undefined)
}

fn map_for_each(interp: &Interp, this: &Value, args: &[Value], _construct: bool) -> Completion {
    let obj = this_map(interp, this)?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(interp.type_error(&format!("{callback:?} is not a function")));
    }
    for (key, value) in map_entries(&obj) {
        interp.call(&callback, arg(args, 1), &[value, key, this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn map_size(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    let obj = this_map(interp, this)?;
    Ok(Value::Number(map_entries(&obj).len() as f64))
}

// ---- ArrayBuffer ----

fn install_array_buffer(interp: &Interp) {
    let prototype = Rc::clone(&interp.realm.array_buffer_prototype);
    constructor(interp, "ArrayBuffer", array_buffer_ctor, &prototype);
    getter(interp, &prototype, "byteLength", array_buffer_byte_length);
}

fn array_buffer_ctor(interp: &Interp, _this: &Value, args: &[Value], construct: bool) -> Completion {
    if !construct {
        return Err(interp.type_error("Constructor ArrayBuffer requires 'new'"));
    }
    let length = match arg(args, 0) {
        Value::Undefined => 0.0,
        value => interp.to_number(&value)?.trunc(),
    };
    if !(0.0..=f64::from(u32::MAX)).contains(&length) {
        return Err(interp.throw_error(ErrorKind::Range, "Array buffer allocation failed"));
    }
    Ok(interp.new_array_buffer(vec![0; length as usize], 0))
}

fn array_buffer_byte_length(interp: &Interp, this: &Value, _args: &[Value], _construct: bool) -> Completion {
    let length = match this {
        Value::Object(obj) => match &obj.borrow().kind {
            ObjectKind::ArrayBuffer { bytes, .. } => Some(bytes.len()),
            _ => None,
        },
        _ => None,
    };
    match length {
        Some(length) => Ok(Value::Number(length as f64)),
        None => Err(interp.type_error("Method ArrayBuffer.prototype.byteLength called on incompatible receiver")),
    }
}

// ---- JSON ----

fn install_json(interp: &Interp) {
    let json = interp.new_object();
    method(interp, &json, "parse", json_parse);
    method(interp, &json, "stringify", json_stringify);
    interp
        .global
        .borrow_mut()
        .properties
        .insert("JSON".to_string(), Property::hidden(Value::Object(json)));
}

fn json_parse(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    let text = interp.to_string(&arg(args, 0))?;
    json::parse(interp, &text).map_err(|err| interp.throw_error(ErrorKind::Syntax, &err))
}

fn json_stringify(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    let indent = match arg(args, 2) {
        Value::Number(n) if n >= 1.0 => " ".repeat((n as usize).min(10)),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let indent = (!indent.is_empty()).then_some(indent);
    Ok(match json::stringify(interp, &arg(args, 0), indent.as_deref())? {
        Some(text) => Value::string(&text),
        None => Value::Undefined,
    })
}

// ---- Math ----

fn install_math(interp: &Interp) {
    let math = interp.new_object();
    constant(&math, "PI", Value::Number(std::f64::consts::PI));
    constant(&math, "E", Value::Number(std::f64::consts::E));
    method(interp, &math, "floor", |i, _, a, _| unary_math(i, a, f64::floor));
    method(interp, &math, "ceil", |i, _, a, _| unary_math(i, a, f64::ceil));
    method(interp, &math, "abs", |i, _, a, _| unary_math(i, a, f64::abs));
    method(interp, &math, "sqrt", |i, _, a, _| unary_math(i, a, f64::sqrt));
    method(interp, &math, "trunc", |i, _, a, _| unary_math(i, a, f64::trunc));
    method(interp, &math, "round", |i, _, a, _| unary_math(i, a, |n| (n + 0.5).floor()));
    method(interp, &math, "pow", math_pow);
    method(interp, &math, "max", math_max);
    method(interp, &math, "min", math_min);
    interp
        .global
        .borrow_mut()
        .properties
        .insert("Math".to_string(), Property::hidden(Value::Object(math)));
}

fn unary_math(interp: &Interp, args: &[Value], f: fn(f64) -> f64) -> Completion {
    Ok(Value::Number(f(interp.to_number(&arg(args, 0))?)))
}

fn math_pow(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    let base = interp.to_number(&arg(args, 0))?;
    let exponent = interp.to_number(&arg(args, 1))?;
    interp.binary_op(crate::lite::ast::BinaryOp::Exp, &Value::Number(base), &Value::Number(exponent))
}

fn math_max(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    let mut result = f64::NEG_INFINITY;
    for value in args {
        let n = interp.to_number(value)?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        result = result.max(n);
    }
    Ok(Value::Number(result))
}

fn math_min(interp: &Interp, _this: &Value, args: &[Value], _construct: bool) -> Completion {
    let mut result = f64::INFINITY;
    for value in args {
        let n = interp.to_number(value)?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        result = result.min(n);
    }
    Ok(Value::Number(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_formatting() {
        assert_eq!(format_radix(255.0, 16), "ff");
        assert_eq!(format_radix(-5.0, 2), "-101");
        assert_eq!(format_radix(0.5, 2), "0.1");
        assert_eq!(format_radix(0.0, 8), "0");
    }

    #[test]
    fn map_keys_treat_zero_signs_alike() {
        assert!(normalize_key(Value::Number(-0.0)).strict_equals(&Value::Number(0.0)));
        assert!(Value::Number(f64::NAN).same_value_zero(&Value::Number(f64::NAN)));
    }
}
