use super::*;

#[test]
fn flatten_query_without_history_is_input_verbatim() {
    let t = Transcript::new();
    assert_eq!(t.flatten_query("What is Exa?"), "What is Exa?");
}

#[test]
fn flatten_query_labels_prior_turns_and_appends_input_unlabeled() {
    let mut t = Transcript::new();
    t.push(Message::user("What is Exa?"));
    let mut reply = Message::assistant();
    reply.content = "A search engine.".into();
    t.push(reply);

    assert_eq!(
        t.flatten_query("Who founded it?"),
        "User: What is Exa?\nAssistant: A search engine.\nWho founded it?"
    );
}

#[test]
fn flatten_query_keeps_empty_assistant_content() {
    let mut t = Transcript::new();
    t.push(Message::user("hi"));
    t.push(Message::assistant());
    assert_eq!(t.flatten_query("again"), "User: hi\nAssistant: \nagain");
}

#[test]
fn messages_get_unique_ids() {
    let a = Message::user("x");
    let b = Message::user("x");
    assert_ne!(a.id, b.id);
    assert_ne!(Message::assistant().id, Message::assistant().id);
}

#[test]
fn get_and_get_mut_find_by_id() {
    let mut t = Transcript::new();
    let m = Message::assistant();
    let id = m.id.clone();
    t.push(Message::user("q"));
    t.push(m);

    t.get_mut(&id).unwrap().content.push_str("hello");
    assert_eq!(t.get(&id).unwrap().content, "hello");
    assert!(t.get("missing").is_none());
    assert_eq!(t.messages().len(), 2);
    assert!(!t.is_empty());
}

#[test]
fn role_labels() {
    assert_eq!(Role::User.label(), "User");
    assert_eq!(Role::Assistant.label(), "Assistant");
}
