use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type, TypePath,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the database is dropped regardless of how the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`mongodb::Database`], and any number of `crate::model::mongodb::Coll<T>`,
/// in any order.
#[proc_macro_attribute]
pub fn backend_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let injected = match check_sig(&item_fn.sig) {
        Ok(injected) => injected,
        Err(err) => return err.into_compile_error().into(),
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Build every collection the test asked for, then pass arguments in declaration order.
    let collections = injected.iter().filter_map(|arg| match arg {
        Injected::Collection(ident, ty) => Some(quote! {
            let #ident = crate::model::mongodb::Coll::<#ty>::from_db(&db);
        }),
        _ => None,
    });
    let call_args = injected.iter().map(Injected::call_arg);

    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, mongodb::Database) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["polls_backend"],
                    None,
                    None,
                );
                let db_client = crate::db_client().await;
                let db = db_client.database(&crate::database());
                crate::model::mongodb::prepare_database(&db).await.unwrap();
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_db(db_client, db.clone()),
                )
                .await
                .unwrap();
                (rocket_client, db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            let (rocket_client, db) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                #[allow(unused_variables)]
                let rocket_client = client_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(#collections)*

                runtime.block_on(#new_name(#(#call_args),*));
            });

            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Something the test wants handed to it.
enum Injected {
    Client,
    Database,
    Collection(Ident, Type),
}

impl Injected {
    fn call_arg(&self) -> TokenStream2 {
        match self {
            Self::Client => quote! { rocket_client },
            Self::Database => quote! { db.clone() },
            Self::Collection(ident, _) => quote! { #ident },
        }
    }
}

/// Ensure the wrapped test is async, work out what to inject, and reject unknown parameters.
fn check_sig(sig: &Signature) -> Result<Vec<Injected>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut injected = Vec::new();
    for input in &sig.inputs {
        let FnArg::Typed(pat_type) = input else {
            return Err(syn::Error::new(input.span(), "Test cannot take `self`"));
        };
        let Pat::Ident(pat_ident) = &*pat_type.pat else {
            return Err(syn::Error::new(
                pat_type.pat.span(),
                "Test argument pattern must be an identifier",
            ));
        };
        let Type::Path(type_path) = &*pat_type.ty else {
            return Err(unknown_arg(input));
        };

        let arg = if type_path.path.is_ident("Client") {
            Injected::Client
        } else if type_path.path.is_ident("Database") {
            Injected::Database
        } else if let Some(ty) = collection_type(type_path) {
            Injected::Collection(pat_ident.ident.clone(), ty)
        } else {
            return Err(unknown_arg(input));
        };

        let duplicate = injected.iter().any(|existing| {
            matches!(
                (existing, &arg),
                (Injected::Client, Injected::Client) | (Injected::Database, Injected::Database)
            )
        });
        if duplicate {
            return Err(syn::Error::new(
                input.span(),
                "Test cannot accept more than one `Client` or `Database`",
            ));
        }
        injected.push(arg);
    }

    Ok(injected)
}

/// If this is `Coll<T>`, get `T`.
fn collection_type(type_path: &TypePath) -> Option<Type> {
    let last = type_path.path.segments.last()?;
    if last.ident != "Coll" {
        return None;
    }
    let PathArguments::AngleBracketed(generics) = &last.arguments else {
        return None;
    };
    match generics.args.first()? {
        GenericArgument::Type(ty) => Some(ty.clone()),
        _ => None,
    }
}

fn unknown_arg(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected one of `client_ident: Client`, `db_ident: Database` or `collection_ident: Coll<T>`",
    )
}
