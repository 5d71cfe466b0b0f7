use cie_parser::languages::Language;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::path::Path;

const GO_FIXTURE: &str = r#"
package service

import (
    "context"
    "fmt"
)

type Repository interface {
    Find(ctx context.Context, id string) (*Record, error)
}

type Record struct {
    ID    string
    Name  string
    Owner *User
}

type User struct {
    Email string
}

type sqlRepository struct {
    conn *Connection
}

func (r *sqlRepository) Find(ctx context.Context, id string) (*Record, error) {
    row := r.conn.QueryRow(ctx, id)
    rec := &Record{}
    if err := row.Scan(&rec.ID, &rec.Name); err != nil {
        return nil, fmt.Errorf("scan: %w", err)
    }
    return rec, nil
}

func NewRepository(conn *Connection) Repository {
    return &sqlRepository{conn: conn}
}

func process(repo Repository) {
    handler := func(ctx context.Context) {
        repo.Find(ctx, "1")
    }
    handler(context.Background())
}
"#;

fn bench_extract(c: &mut Criterion) {
    c.bench_function("parse_file/go_medium_fixture", |b| {
        b.iter(|| {
            cie_parser::parse_file(
                Path::new("service.go"),
                black_box(GO_FIXTURE.as_bytes()),
                Language::Go,
                100_000,
            )
        });
    });
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
