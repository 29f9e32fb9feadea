mod backlog;
mod confirmation;
mod elections;
mod node;
