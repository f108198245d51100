use crate::seed::{run_seeder, Seeder};
use crate::seeds::{
    class::ClassSeeder, parent_contact::ParentContactSeeder, student::StudentSeeder,
    template::TemplateSeeder, workflow::WorkflowSeeder,
};

mod seed;
mod seeds;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = db::connect(&database_url).await;

    for (seeder, name) in [
        (Box::new(ClassSeeder) as Box<dyn Seeder>, "Class"),
        (Box::new(StudentSeeder), "Student"),
        (Box::new(ParentContactSeeder), "ParentContact"),
        (Box::new(TemplateSeeder), "NotificationTemplate"),
        (Box::new(WorkflowSeeder), "Workflow"),
    ] {
        run_seeder(&*seeder, name, &db).await;
    }
}
