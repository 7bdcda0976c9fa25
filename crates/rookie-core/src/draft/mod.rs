// Draft domain: pick/prospect types and the rookie draft order builder.

pub mod order;
pub mod pick;
