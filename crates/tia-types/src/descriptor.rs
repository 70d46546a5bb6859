//! JVM method descriptor rendering
//!
//! Turns `(ILjava/lang/String;[J)Z` into `(int, String, long[]): boolean`
//! for the package tree. Malformed descriptors are returned unchanged.

/// Human readable declaration for a method descriptor
#[must_use]
pub fn declaration(desc: &str) -> String {
    parse(desc).unwrap_or_else(|| desc.to_string())
}

fn parse(desc: &str) -> Option<String> {
    let rest = desc.strip_prefix('(')?;
    let (params, ret) = rest.split_once(')')?;

    let mut rendered = Vec::new();
    let mut cursor = params;
    while !cursor.is_empty() {
        let (ty, tail) = field_type(cursor)?;
        rendered.push(ty);
        cursor = tail;
    }

    let ret = if ret == "V" {
        "void".to_string()
    } else {
        let (ty, tail) = field_type(ret)?;
        if !tail.is_empty() {
            return None;
        }
        ty
    };

    Some(format!("({}): {}", rendered.join(", "), ret))
}

fn field_type(input: &str) -> Option<(String, &str)> {
    let mut chars = input.chars();
    let head = chars.next()?;
    let tail = chars.as_str();
    let primitive = match head {
        'Z' => "boolean",
        'B' => "byte",
        'C' => "char",
        'S' => "short",
        'I' => "int",
        'J' => "long",
        'F' => "float",
        'D' => "double",
        'L' => {
            let (class, rest) = tail.split_once(';')?;
            let simple = class.rsplit('/').next().unwrap_or(class);
            return Some((simple.to_string(), rest));
        }
        '[' => {
            let (element, rest) = field_type(tail)?;
            return Some((format!("{element}[]"), rest));
        }
        _ => return None,
    };
    Some((primitive.to_string(), tail))
}
