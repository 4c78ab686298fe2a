//! Line protocol encoding for activity points

use postsaga_domain::Action;

pub(crate) const POST_MEASUREMENT: &str = "post_metrics";
pub(crate) const USER_MEASUREMENT: &str = "user_metrics";

/// Both points for one recorded action, newline separated.
/// No timestamp is written; the server stamps each point on arrival.
pub(crate) fn action_points(post_id: &str, user_id: &str, action: Action) -> String {
    let action = escape_tag(action.as_str());
    format!(
        "{post},post_id={post_id},action={action} count=1i\n\
         {user},user_id={user_id},action={action} post_id={field}",
        post = POST_MEASUREMENT,
        post_id = escape_tag(post_id),
        user = USER_MEASUREMENT,
        user_id = escape_tag(user_id),
        field = quote_field(post_id),
    )
}

/// Tag keys and values escape commas, equals signs and spaces
fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ',' | '=' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// String field values are double-quoted with `"` and `\` escaped
fn quote_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_points() {
        let lines = action_points("post3", "u1", Action::Upvote);

        assert_eq!(
            lines,
            "post_metrics,post_id=post3,action=upvote count=1i\n\
             user_metrics,user_id=u1,action=upvote post_id=\"post3\""
        );
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_tag("a b,c=d"), "a\\ b\\,c\\=d");
        assert_eq!(quote_field("say \"hi\"\\"), "\"say \\\"hi\\\"\\\\\"");
    }
}
