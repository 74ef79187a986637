pub mod face_stance_skill;
pub mod lifecycle;
