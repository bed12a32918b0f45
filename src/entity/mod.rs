mod note;

pub use note::{CreateNote, Note, NoteList};
