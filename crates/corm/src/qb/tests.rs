use super::*;
use crate::args;
use crate::schema::fixtures::{Audit, BlogPost, Draft, Ghost, User};
use crate::value::InArg;

fn pg() -> Qb {
    Qb::postgres()
}

fn no_columns() -> Vec<&'static str> {
    Vec::new()
}

// ==================== SELECT ====================

#[test]
fn select_basic() {
    let q = pg()
        .select(["id", "name"])
        .from("users")
        .where_eq("status", "active")
        .filter(Expr::gt("\"age\"", 18))
        .order_by_desc("created_at")
        .limit(20)
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT "id", "name" FROM "users" WHERE ("status" = $1) AND ("age" > $2) ORDER BY "created_at" DESC LIMIT $3"#
    );
    assert_eq!(q.args, args!["active", 18, 20]);
}

#[test]
fn select_star_and_qualified_columns() {
    let q = pg().select(no_columns()).from("public.users").build().unwrap();
    assert_eq!(q.sql, r#"SELECT * FROM "public"."users""#);

    let q = pg().select(["u.*", "o.id"]).from("users").build().unwrap();
    assert_eq!(q.sql, r#"SELECT "u".*, "o"."id" FROM "users""#);
}

#[test]
fn select_without_source_needs_columns() {
    let err = pg().select(no_columns()).build().unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));

    let q = pg().select(no_columns()).column_expr(Expr::raw("1")).build().unwrap();
    assert_eq!(q.sql, "SELECT 1");
}

#[test]
fn select_rejects_bad_identifiers_and_keeps_first_error() {
    let err = pg()
        .select(["id; DROP TABLE users"])
        .from("also bad")
        .limit(-1)
        .build()
        .unwrap_err();
    assert!(err.is_invalid_identifier());
    assert_eq!(err.to_string(), r#"Invalid identifier: "id; DROP TABLE users""#);

    let err = pg().select(["id"]).from("users").limit(-1).build().unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn select_joins() {
    let q = pg()
        .select(["u.id", "o.total"])
        .from_as("users", "u")
        .left_join_as("orders", "o", Expr::raw(r#""o"."user_id" = "u"."id""#))
        .where_eq("o.total", 10)
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT "u"."id", "o"."total" FROM "users" AS "u" LEFT JOIN "orders" AS "o" ON "o"."user_id" = "u"."id" WHERE ("o"."total" = $1)"#
    );

    let q = pg()
        .select(["a.x"])
        .from("a")
        .inner_join("b", Expr::raw(r#""a"."id" = "b"."id""#))
        .full_join("c", Expr::template(r#""c"."n" > ?"#, [2]))
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT "a"."x" FROM "a" INNER JOIN "b" ON "a"."id" = "b"."id" FULL JOIN "c" ON "c"."n" > $1"#
    );

    let err = pg()
        .select(["id"])
        .from("a")
        .right_join("b", Expr::default())
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn select_group_by_having() {
    let q = pg()
        .select(["dept"])
        .column_expr(Expr::count("*").alias("n"))
        .from("emp")
        .group_by(["dept"])
        .having_raw("COUNT(*) > ?", [5])
        .having(Expr::raw("MAX(salary) < 100"))
        .distinct()
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT DISTINCT "dept", COUNT(*) AS n FROM "emp" GROUP BY "dept" HAVING (COUNT(*) > $1) AND (MAX(salary) < 100)"#
    );
    assert_eq!(q.args, args![5]);
}

#[test]
fn order_direction_parsing() {
    assert_eq!("desc".parse::<Order>().unwrap(), Order::Desc);
    assert_eq!("".parse::<Order>().unwrap(), Order::Asc);
    assert!("sideways".parse::<Order>().is_err());

    let err = pg()
        .select(["id"])
        .from("t")
        .order_by("id", "DESC; DROP")
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn offset_without_limit_per_dialect() {
    let q = pg().select(no_columns()).from("t").offset(5).build().unwrap();
    assert_eq!(q.sql, r#"SELECT * FROM "t" OFFSET $1"#);

    let q = Qb::mysql().select(no_columns()).from("t").offset(5).build().unwrap();
    assert_eq!(q.sql, "SELECT * FROM `t` LIMIT 18446744073709551615 OFFSET ?");

    let q = Qb::sqlite().select(no_columns()).from("t").offset(5).build().unwrap();
    assert_eq!(q.sql, r#"SELECT * FROM "t" LIMIT -1 OFFSET ?"#);
    assert_eq!(q.args, args![5]);

    let q = pg().select(no_columns()).from("t").limit_offset(10, 20).build().unwrap();
    assert_eq!(q.sql, r#"SELECT * FROM "t" LIMIT $1 OFFSET $2"#);
    assert_eq!(q.args, args![10, 20]);
}

#[test]
fn union_numbers_across_parts() {
    let qb = pg();
    let left = qb.select(["id"]).from("a").where_eq("x", 1);
    let right = qb
        .select(["id"])
        .from("b")
        .where_eq("y", 2)
        .order_by_asc("id")
        .limit(5);
    let q = left
        .union_all(right)
        .order_by_desc("id")
        .limit(10)
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT "id" FROM "a" WHERE ("x" = $1) UNION ALL (SELECT "id" FROM "b" WHERE ("y" = $2) ORDER BY "id" ASC LIMIT $3) ORDER BY "id" DESC LIMIT $4"#
    );
    assert_eq!(q.args, args![1, 2, 5, 10]);

    let q = qb
        .select(["id"])
        .from("a")
        .union(qb.select(["id"]).from("b"))
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"SELECT "id" FROM "a" UNION SELECT "id" FROM "b""#);
}

#[test]
fn for_update_with_union_is_rejected() {
    let qb = pg();
    let q = qb.select(["id"]).from("jobs").where_eq("state", "new").for_update();
    assert_eq!(
        q.build().unwrap().sql,
        r#"SELECT "id" FROM "jobs" WHERE ("state" = $1) FOR UPDATE"#
    );

    let err = q.union(qb.select(["id"]).from("b")).build().unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));

    let err = qb
        .select(["id"])
        .from("a")
        .union(qb.select(["id"]).from("b").for_update())
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn from_select_continues_numbering() {
    let qb = pg();
    let sub = qb.select(["id"]).from("users").where_eq("active", true);
    let q = qb
        .select(no_columns())
        .from_select(sub, "t")
        .where_raw(r#""t"."id" > ?"#, [3])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT * FROM (SELECT "id" FROM "users" WHERE ("active" = $1)) AS "t" WHERE ("t"."id" > $2)"#
    );
    assert_eq!(q.args, args![true, 3]);
}

#[test]
fn nesting_requires_same_dialect() {
    let sub = Qb::mysql().select(["id"]).from("u");
    let err = pg().select(no_columns()).from_select(sub, "t").build().unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn where_subquery_operators() {
    let qb = pg();
    let q = qb
        .select(["name"])
        .from("users")
        .where_in_subquery(
            "id",
            qb.select(["user_id"]).from("orders").where_eq("total", 100),
        )
        .where_eq("active", true)
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT "name" FROM "users" WHERE ("id" IN (SELECT "user_id" FROM "orders" WHERE ("total" = $1))) AND ("active" = $2)"#
    );

    let q = qb
        .select(["id"])
        .from("t")
        .where_subquery("score", "not in", qb.select(["score"]).from("banned"))
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT "id" FROM "t" WHERE ("score" NOT IN (SELECT "score" FROM "banned"))"#
    );

    let err = qb
        .select(["id"])
        .from("t")
        .where_subquery("score", "BETWEEN", qb.select(["score"]).from("x"))
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn where_map_is_sorted() {
    let q = pg()
        .select(["id"])
        .from("t")
        .where_map([("b", 2), ("a", 1)])
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"SELECT "id" FROM "t" WHERE ("a" = $1) AND ("b" = $2)"#);
    assert_eq!(q.args, args![1, 2]);
}

#[test]
fn where_in_flattens_and_handles_empty() {
    let q = pg()
        .select(["id"])
        .from("t")
        .where_in("id", [InArg::list([1, 2]), InArg::from(3)])
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"SELECT "id" FROM "t" WHERE ("id" IN ($1, $2, $3))"#);

    let q = pg()
        .select(["id"])
        .from("t")
        .where_in("id", Vec::<i64>::new())
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"SELECT "id" FROM "t" WHERE (1=0)"#);
    assert!(q.args.is_empty());
}

#[test]
fn where_like_and_null() {
    let q = Qb::mysql()
        .select(["id"])
        .from("t")
        .where_like("name", "a%")
        .where_null("deleted_at")
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        "SELECT `id` FROM `t` WHERE (`name` LIKE ?) AND (`deleted_at` IS NULL)"
    );
}

#[test]
fn raw_leaves_literal_markers() {
    let q = pg()
        .raw("SELECT * FROM t WHERE a = ? AND b = '?'", [1])
        .unwrap();
    assert_eq!(q.sql, "SELECT * FROM t WHERE a = $1 AND b = '?'");
    assert!(pg().raw("SELECT ?", Vec::<Value>::new()).unwrap_err().is_placeholder_mismatch());
}

#[test]
fn blank_fragments_with_args_are_rejected() {
    let qb = pg();
    let err = qb
        .select(["id"])
        .from("t")
        .where_raw("   ", [42])
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::PlaceholderMismatch {
            expected: 1,
            found: 0
        }
    ));

    let err = qb
        .select(["dept"])
        .from("emp")
        .group_by(["dept"])
        .having_raw(" ", [7])
        .build()
        .unwrap_err();
    assert!(err.is_placeholder_mismatch());

    let err = qb
        .select(["id"])
        .from("t")
        .column_expr(Expr::template("", [1, 2]))
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::PlaceholderMismatch {
            expected: 2,
            found: 0
        }
    ));

    let err = qb
        .delete("t")
        .where_raw("", [1])
        .allow_empty_where()
        .build()
        .unwrap_err();
    assert!(err.is_placeholder_mismatch());

    let err = qb
        .update("t")
        .set("a", 1)
        .filter(Expr::not(Expr::template(" ", [5])))
        .build()
        .unwrap_err();
    assert!(err.is_placeholder_mismatch());

    // Blank text without arguments is still skipped.
    let q = qb
        .select(["id"])
        .from("t")
        .where_raw("  ", Vec::<Value>::new())
        .having_raw("", Vec::<Value>::new())
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"SELECT "id" FROM "t""#);
}

#[test]
fn union_tail_applies_to_whole_compound() {
    let qb = pg();
    let q = qb
        .select(["a"])
        .from("t")
        .order_by_desc("a")
        .limit(1)
        .union(qb.select(["a"]).from("u"))
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT "a" FROM "t" UNION SELECT "a" FROM "u" ORDER BY "a" DESC LIMIT $1"#
    );

    // Limiting the first member alone goes through a derived table.
    let first = qb.select(["a"]).from("t").order_by_desc("a").limit(1);
    let q = qb
        .select(no_columns())
        .from_select(first, "first")
        .union(qb.select(["a"]).from("u"))
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT * FROM (SELECT "a" FROM "t" ORDER BY "a" DESC LIMIT $1) AS "first" UNION SELECT "a" FROM "u""#
    );
    assert_eq!(q.args, args![1]);
}

// ==================== Factory ====================

#[test]
fn factory_from_driver_and_config() {
    assert_eq!(Qb::for_driver("pgx").unwrap().dialect().name(), "postgres");
    assert!(matches!(Qb::for_driver("oracle").unwrap_err(), OrmError::Config(_)));

    let qb = Qb::from_config(&CormConfig::new().dialect("sqlite3").max_sql_len(24)).unwrap();
    assert_eq!(qb.dialect().name(), "sqlite");
    assert!(qb.select(["id"]).from("t").build().is_ok());
    let err = qb
        .select(["id", "name", "email"])
        .from("users")
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));

    let err = Qb::from_config(&CormConfig::new().schema_cache_capacity(0)).unwrap_err();
    assert!(matches!(err, OrmError::Config(_)));
}

// ==================== INSERT ====================

#[test]
fn insert_values_with_returning() {
    let build = |qb: Qb| {
        qb.insert("users")
            .columns(["name", "age"])
            .values(args!["a", 1])
            .values(args!["b", 2])
            .returning(["id"])
            .build()
            .unwrap()
    };
    let q = build(pg());
    assert_eq!(
        q.sql,
        r#"INSERT INTO "users" ("name", "age") VALUES ($1, $2), ($3, $4) RETURNING "id""#
    );
    assert_eq!(q.args, args!["a", 1, "b", 2]);

    let q = build(Qb::mysql());
    assert_eq!(q.sql, "INSERT INTO `users` (`name`, `age`) VALUES (?, ?), (?, ?)");
}

#[test]
fn insert_values_shape_errors() {
    let err = pg().insert("users").values([1]).build().unwrap_err();
    assert!(err.is_structural());

    let err = pg()
        .insert("users")
        .columns(["a", "b"])
        .values([1])
        .build()
        .unwrap_err();
    assert!(err.is_structural());

    let err = pg()
        .insert("users")
        .columns(["a"])
        .values([1])
        .map([("a", 1)])
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));

    let err = pg().insert("users").build().unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn insert_maps_sorted_columns() {
    let q = pg()
        .insert("users")
        .maps([
            vec![("name", "a"), ("email", "x")],
            vec![("email", "y"), ("name", "b")],
        ])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"INSERT INTO "users" ("email", "name") VALUES ($1, $2), ($3, $4)"#
    );
    assert_eq!(q.args, args!["x", "a", "y", "b"]);

    let err = pg()
        .insert("users")
        .maps([vec![("a", 1)], vec![("b", 2)]])
        .build()
        .unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn insert_maps_with_declared_columns() {
    let q = pg()
        .insert("users")
        .columns(["name"])
        .map([("NAME", "a"), ("extra", "z")])
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"INSERT INTO "users" ("name") VALUES ($1)"#);
    assert_eq!(q.args, args!["a"]);

    let err = pg()
        .insert("users")
        .columns(["name", "age"])
        .map([("name", "a")])
        .build()
        .unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn insert_model_honors_omitempty() {
    let qb = pg();
    let alice = User::new(0, "alice", 0);

    let q = qb.insert("").model(&alice).build().unwrap();
    assert_eq!(q.sql, r#"INSERT INTO "users" ("name") VALUES ($1)"#);

    let q = qb.insert("").model(&alice).include_zero(true).build().unwrap();
    assert_eq!(q.sql, r#"INSERT INTO "users" ("name", "age") VALUES ($1, $2)"#);
    assert_eq!(q.args, args!["alice", 0]);

    let q = qb
        .insert("")
        .include_primary_key(true)
        .model(&User::new(9, "bob", 40))
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"INSERT INTO "users" ("id", "name", "age") VALUES ($1, $2, $3)"#
    );
    assert_eq!(q.args, args![9, "bob", 40]);
}

#[test]
fn insert_models_writes_every_column() {
    let q = pg()
        .insert("")
        .models(&[User::new(1, "a", 0), User::new(2, "b", 30)])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"INSERT INTO "users" ("name", "age") VALUES ($1, $2), ($3, $4)"#
    );
    assert_eq!(q.args, args!["a", 0, "b", 30]);

    let err = pg()
        .insert("")
        .models(&[User::new(1, "a", 0)])
        .models(&[Ghost::default()])
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn insert_model_embedded_and_excluded_fields() {
    let post = BlogPost {
        id: 5,
        title: "hello".into(),
        cached_html: "<p>".into(),
        audit: Audit {
            created_by: "me".into(),
            version: 3,
        },
        view_count: 0,
    };
    let q = pg().insert("").model(&post).build().unwrap();
    assert_eq!(
        q.sql,
        r#"INSERT INTO "blog_post" ("title", "created_by") VALUES ($1, $2)"#
    );
    assert_eq!(q.args, args!["hello", "me"]);

    let q = pg()
        .insert("")
        .model(&post)
        .include_readonly(true)
        .include_auto(true)
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"INSERT INTO "blog_post" ("title", "created_by", "version") VALUES ($1, $2, $3)"#
    );
}

#[test]
fn insert_model_with_declared_columns() {
    let qb = pg();
    let alice = User::new(3, "alice", 0);

    let q = qb.insert("").columns(["name"]).model(&alice).build().unwrap();
    assert_eq!(q.sql, r#"INSERT INTO "users" ("name") VALUES ($1)"#);
    assert_eq!(q.args, args!["alice"]);

    // Declared order wins; declared zero values are written.
    let q = qb
        .insert("")
        .columns(["AGE", "name"])
        .models(&[alice.clone(), User::new(4, "bob", 41)])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"INSERT INTO "users" ("age", "name") VALUES ($1, $2), ($3, $4)"#
    );
    assert_eq!(q.args, args![0, "alice", 41, "bob"]);

    let err = qb
        .insert("")
        .columns(["email"])
        .model(&alice)
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidModel(_)));

    let err = qb.insert("").columns(["id", "name"]).model(&alice).build().unwrap_err();
    assert!(matches!(err, OrmError::InvalidModel(_)));

    let q = qb
        .insert("")
        .columns(["id", "name"])
        .include_primary_key(true)
        .model(&alice)
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"INSERT INTO "users" ("id", "name") VALUES ($1, $2)"#);
    assert_eq!(q.args, args![3, "alice"]);
}

#[test]
fn insert_model_table_resolution() {
    let err = pg().insert("").model(&Ghost::default()).build().unwrap_err();
    assert!(err.is_invalid_identifier());

    let q = pg().insert("ghosts").model(&Ghost::default()).build().unwrap();
    assert_eq!(q.sql, r#"INSERT INTO "ghosts" ("name") VALUES ($1)"#);
}

#[test]
fn insert_model_with_absent_embed() {
    let draft = Draft { id: 1, audit: None };
    let err = pg().insert("drafts").model(&draft).build().unwrap_err();
    assert!(matches!(err, OrmError::InvalidModel(_)));
}

#[test]
fn insert_suffix_and_select() {
    let q = pg()
        .insert("users")
        .columns(["id", "name"])
        .values(args![1, "a"])
        .suffix_raw("ON CONFLICT (id) DO UPDATE SET name = ?", ["b"])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"INSERT INTO "users" ("id", "name") VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET name = $3"#
    );

    let qb = pg();
    let q = qb
        .insert("archive")
        .columns(["id", "name"])
        .from_select(qb.select(["id", "name"]).from("users").where_eq("active", false))
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"INSERT INTO "archive" ("id", "name") SELECT "id", "name" FROM "users" WHERE ("active" = $1)"#
    );
}

#[test]
fn insert_suffix_rejects_blank_text_with_args() {
    let err = pg()
        .insert("users")
        .columns(["id"])
        .values([1])
        .suffix_raw("  ", ["b"])
        .build()
        .unwrap_err();
    assert!(err.is_placeholder_mismatch());

    let q = pg()
        .insert("users")
        .columns(["id"])
        .values([1])
        .suffix_raw("", Vec::<Value>::new())
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"INSERT INTO "users" ("id") VALUES ($1)"#);
}

// ==================== UPDATE ====================

#[test]
fn update_basic() {
    let q = pg()
        .update("users")
        .set("name", "bob")
        .increment("visits", 1)
        .where_eq("id", 7)
        .returning(["id"])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"UPDATE "users" SET "name" = $1, "visits" = "visits" + $2 WHERE ("id" = $3) RETURNING "id""#
    );
    assert_eq!(q.args, args!["bob", 1, 7]);
}

#[test]
fn update_requires_where() {
    let err = pg().update("users").set("a", 1).build().unwrap_err();
    assert!(err.is_missing_where());

    let err = pg()
        .update("users")
        .set("a", 1)
        .where_raw("   ", Vec::<Value>::new())
        .build()
        .unwrap_err();
    assert!(err.is_missing_where());

    let q = pg()
        .update("users")
        .set("a", 1)
        .allow_empty_where()
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"UPDATE "users" SET "a" = $1"#);

    let err = pg().update("users").where_eq("id", 1).build().unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn update_limit_depends_on_dialect() {
    let err = pg()
        .update("users")
        .set("a", 1)
        .where_eq("id", 1)
        .limit(1)
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Unsupported { dialect: "postgres", .. }));

    let q = Qb::mysql()
        .update("users")
        .set("a", 1)
        .where_eq("id", 1)
        .limit(1)
        .build()
        .unwrap();
    assert_eq!(q.sql, "UPDATE `users` SET `a` = ? WHERE (`id` = ?) LIMIT ?");
}

#[test]
fn update_set_map_and_model() {
    let q = pg()
        .update("t")
        .set_map([("b", 2), ("a", 1)])
        .decrement("stock", 3)
        .where_eq("id", 1)
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"UPDATE "t" SET "a" = $1, "b" = $2, "stock" = "stock" - $3 WHERE ("id" = $4)"#
    );

    let bob = User::new(1, "bob", 0);
    let q = pg()
        .update("")
        .set_model(&bob)
        .where_eq("id", bob.id)
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"UPDATE "users" SET "name" = $1 WHERE ("id" = $2)"#);

    let q = pg()
        .update("")
        .set_model(&bob)
        .where_eq("id", bob.id)
        .include_zero(true)
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"UPDATE "users" SET "name" = $1, "age" = $2 WHERE ("id" = $3)"#
    );
    assert_eq!(q.args, args!["bob", 0, 1]);
}

// ==================== DELETE ====================

#[test]
fn delete_basic() {
    let q = pg()
        .delete("users")
        .where_eq("id", 1)
        .returning(["id"])
        .build()
        .unwrap();
    assert_eq!(q.sql, r#"DELETE FROM "users" WHERE ("id" = $1) RETURNING "id""#);

    let q = Qb::mysql()
        .delete("users")
        .where_eq("id", 1)
        .returning(["id"])
        .limit(10)
        .build()
        .unwrap();
    assert_eq!(q.sql, "DELETE FROM `users` WHERE (`id` = ?) LIMIT ?");
    assert_eq!(q.args, args![1, 10]);
}

#[test]
fn delete_requires_where_and_table() {
    assert!(pg().delete("users").build().unwrap_err().is_missing_where());

    let q = pg().delete("users").allow_empty_where().build().unwrap();
    assert_eq!(q.sql, r#"DELETE FROM "users""#);

    assert!(pg().delete("").where_eq("id", 1).build().unwrap_err().is_invalid_identifier());

    let err = Qb::sqlite().delete("t").where_eq("id", 1).limit(1).build().unwrap_err();
    assert!(matches!(err, OrmError::Unsupported { .. }));
}

// ==================== Batch UPDATE ====================

#[test]
fn batch_update_rows() {
    let q = pg()
        .batch_update("users")
        .rows([
            BatchRow::new(1).set("name", "a"),
            BatchRow::new(2).set("name", "b").set("age", 10),
        ])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"UPDATE "users" SET "name" = CASE "id" WHEN $1 THEN $2 WHEN $3 THEN $4 ELSE "name" END, "age" = CASE "id" WHEN $5 THEN "age" WHEN $6 THEN $7 ELSE "age" END WHERE "id" IN ($8, $9)"#
    );
    assert_eq!(q.args, args![1, "a", 2, "b", 1, 2, 10, 1, 2]);
}

#[test]
fn batch_update_extra_where_and_dialect() {
    let q = Qb::mysql()
        .batch_update("users")
        .columns(["name"])
        .rows([BatchRow::new(1).set("name", "a").set("ignored", 5)])
        .where_eq("tenant", 5)
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        "UPDATE `users` SET `name` = CASE `id` WHEN ? THEN ? ELSE `name` END WHERE `id` IN (?) AND (`tenant` = ?)"
    );
    assert_eq!(q.args, args![1, "a", 1, 5]);
}

#[test]
fn batch_update_rejects_key_columns() {
    let err = pg()
        .batch_update("users")
        .rows([BatchRow::new(1).set("id", 2)])
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));

    let err = pg()
        .batch_update("users")
        .columns(["ID"])
        .rows([BatchRow::new(1).set("name", "a")])
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));

    let err = pg().batch_update("users").build().unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn batch_update_maps() {
    let q = pg()
        .batch_update("users")
        .key("uid")
        .maps([
            vec![("uid", Value::from(1)), ("name", Value::from("a"))],
            vec![("uid", Value::from(2))],
        ])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"UPDATE "users" SET "name" = CASE "uid" WHEN $1 THEN $2 WHEN $3 THEN "name" ELSE "name" END WHERE "uid" IN ($4, $5)"#
    );
    assert_eq!(q.args, args![1, "a", 2, 1, 2]);

    let err = pg()
        .batch_update("users")
        .maps([vec![("name", "a")]])
        .build()
        .unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn batch_update_models_keep_zero_omitempty() {
    let q = pg()
        .batch_update("")
        .models(&[User::new(1, "a", 0), User::new(2, "b", 30)])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"UPDATE "users" SET "name" = CASE "id" WHEN $1 THEN $2 WHEN $3 THEN $4 ELSE "name" END, "age" = CASE "id" WHEN $5 THEN "age" WHEN $6 THEN $7 ELSE "age" END WHERE "id" IN ($8, $9)"#
    );
    assert_eq!(q.args, args![1, "a", 2, "b", 1, 2, 30, 1, 2]);

    let q = pg()
        .batch_update("people")
        .columns(["age"])
        .models(&[User::new(3, "c", 7)])
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"UPDATE "people" SET "age" = CASE "id" WHEN $1 THEN $2 ELSE "age" END WHERE "id" IN ($3)"#
    );

    let err = pg()
        .batch_update("")
        .columns(["missing"])
        .models(&[User::new(3, "c", 7)])
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidModel(_)));
}

// ==================== Traits ====================

#[test]
fn builders_share_the_trait_surface() {
    fn sql_of(b: &impl SqlBuilder) -> String {
        b.to_sql()
    }
    let qb = pg();
    assert_eq!(sql_of(&qb.select(["id"]).from("t")), r#"SELECT "id" FROM "t""#);
    assert!(sql_of(&qb.delete("t")).starts_with("<Missing WHERE"));
}
