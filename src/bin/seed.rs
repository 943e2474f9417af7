use axum_payments_api::{
    db::{create_orm_conn, run_migrations},
    entity::{
        enums::PersonType,
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    middleware::auth::issue_token,
};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;

    let orm = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let admin_id = ensure_user(
        &orm,
        "Admin Example",
        "admin@example.com",
        None,
        PersonType::Individual,
        "admin",
    )
    .await?;
    let user_id = ensure_user(
        &orm,
        "Maria Souza Lima",
        "user@example.com",
        Some("123.456.789-09"),
        PersonType::Individual,
        "user",
    )
    .await?;
    seed_products(&orm).await?;

    let user_token = issue_token(user_id, "user", 24)?;
    let admin_token = issue_token(admin_id, "admin", 24)?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    println!("User token: {user_token}");
    println!("Admin token: {admin_token}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    name: &str,
    email: &str,
    tax_id: Option<&str>,
    person_type: PersonType,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already exists");
        return Ok(existing.id);
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        tax_id: Set(tax_id.map(ToString::to_string)),
        person_type: Set(person_type),
        role: Set(role.to_string()),
        created_at: NotSet,
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    // (name, description, individual price, business price) in cents
    let products = [
        ("Soil Analysis Kit", "Basic pH and nutrient test", 4990, 4490),
        ("Irrigation Timer", "Programmable two-zone timer", 12990, 11690),
        ("Seed Starter Tray", "72-cell tray with dome", 2590, 2290),
        ("Consulting Hour", "Remote session with an agronomist", 19900, 17900),
    ];

    for (name, description, individual, business) in products {
        let exists = Products::find()
            .filter(ProdCol::Name.eq(name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            price_individual: Set(Decimal::new(individual, 2)),
            price_business: Set(Decimal::new(business, 2)),
            is_active: Set(true),
            created_at: NotSet,
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
